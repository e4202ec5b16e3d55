pub mod auth;
mod cities;
mod coupons;
pub mod error;
mod memberships;
mod reviews;
mod salons;
mod uploads;
mod validation;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    // Public catalog reads
    let public_routes = Router::new()
        .route("/cities", get(cities::list_cities))
        .route("/salons", get(salons::list_salons))
        .route("/salons/:id", get(salons::get_salon))
        .route("/memberships/:salon_id/plans", get(memberships::list_plans))
        .route("/reviews/salon/:salon_id", get(reviews::list_by_salon))
        .route("/reviews/salon/:salon_id/stats", get(reviews::salon_stats))
        .route("/reviews/:id", get(reviews::get_review));

    // Authenticated customer routes
    let customer_routes = Router::new()
        // Coupons
        .route("/coupons/:salon_id/:coupon_id/buy", post(coupons::buy_coupon))
        .route("/coupons/:salon_id/purchase", post(coupons::purchase_cart))
        .route("/coupons/:salon_id/redeem", post(coupons::redeem_coupon))
        .route("/coupons/customer/:customer_id", get(coupons::customer_purchases))
        // Memberships
        .route("/memberships/:salon_id/purchase", post(memberships::purchase_membership))
        .route(
            "/memberships/:salon_id/customers/:customer_id/coupons",
            get(memberships::coupons_for_customer),
        )
        .route("/memberships/customer/:customer_id", get(memberships::list_for_customer))
        .route(
            "/memberships/customer/:customer_id/active",
            get(memberships::list_active_for_customer),
        )
        // Reviews
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/user/me", get(reviews::my_reviews))
        .route("/reviews/:id", put(reviews::update_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        .route("/reviews/:id/like", post(reviews::toggle_like))
        .route("/reviews/:id/report", post(reviews::report_review))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Admin-only management routes
    let admin_routes = Router::new()
        // Cities
        .route("/cities", post(cities::create_city))
        .route("/cities/bulk", post(cities::bulk_create_cities))
        .route("/cities/:id/activate", put(cities::activate_city))
        .route("/cities/:id/deactivate", put(cities::deactivate_city))
        .route("/cities/:id", delete(cities::delete_city))
        // Salons
        .route("/salons", post(salons::create_salon))
        .route("/salons/bulk-delete", post(salons::bulk_delete_salons))
        .route("/salons/:id", put(salons::update_salon))
        .route("/salons/:id", delete(salons::delete_salon))
        .route("/salons/:id/status", patch(salons::toggle_salon_status))
        .route("/salons/:id/images", post(salons::upload_salon_images))
        .route("/salons/images/:image_id", delete(salons::delete_salon_image))
        // Coupon catalog
        .route("/coupons", get(coupons::list_all))
        .route("/coupons/:salon_id", post(coupons::create_coupon))
        .route("/coupons/:salon_id", get(coupons::list_by_salon))
        // Membership plans
        .route("/memberships/:salon_id/plans", post(memberships::create_plan))
        // Uploads
        .route("/uploads/single", post(uploads::upload_single))
        .route("/uploads/multiple", post(uploads::upload_multiple))
        // Review moderation
        .route("/reviews", get(reviews::admin_list_reviews))
        .route("/reviews/reports", get(reviews::list_reports))
        .route("/reviews/reports/:report_id", patch(reviews::handle_report))
        .route("/reviews/:id/moderate", patch(reviews::moderate_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ));

    let origins: Vec<HeaderValue> = state
        .config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", public_routes.merge(customer_routes))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
