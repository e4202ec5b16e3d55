//! Coupon endpoints, thin wrappers over the coupon ledger and the
//! redemption engine.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::validation;
use crate::db::{
    BuyCouponRequest, CartItemReceipt, Coupon, CouponRedemption, CreateCouponRequest,
    CustomerCoupon, PurchaseCartRequest, PurchasedCoupon, RedeemCouponRequest,
};
use crate::AppState;

/// Create a coupon for a salon
///
/// POST /api/coupons/:salonId
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Json(req): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), ApiError> {
    if let Err(e) = validation::validate_coupon_code(&req.code) {
        return Err(ApiError::validation_field("code", e));
    }
    if req.max_usage < 1 {
        return Err(ApiError::validation_field("max_usage", "max_usage must be at least 1"));
    }

    let salon: Option<(i64,)> = sqlx::query_as("SELECT id FROM salons WHERE id = ?")
        .bind(salon_id)
        .fetch_optional(&state.db)
        .await?;
    if salon.is_none() {
        return Err(ApiError::not_found("Salon not found"));
    }

    let coupon = state.coupons.create_coupon(salon_id, &req).await?;
    info!(salon = salon_id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// All coupons defined for a salon
///
/// GET /api/coupons/:salonId
pub async fn list_by_salon(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    let coupons = state.coupons.coupons_for_salon(salon_id).await?;
    Ok(Json(coupons))
}

/// Every coupon across all salons
///
/// GET /api/coupons
pub async fn list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    let coupons = state.coupons.all_coupons().await?;
    Ok(Json(coupons))
}

/// Buy one unit of a coupon
///
/// POST /api/coupons/:salonId/:couponId/buy
pub async fn buy_coupon(
    State(state): State<Arc<AppState>>,
    Path((salon_id, coupon_id)): Path<(i64, i64)>,
    Json(req): Json<BuyCouponRequest>,
) -> Result<(StatusCode, Json<CustomerCoupon>), ApiError> {
    let instance = state
        .coupons
        .buy_coupon(req.customer_id, salon_id, coupon_id)
        .await?;
    info!(
        customer = req.customer_id,
        salon = salon_id,
        coupon = coupon_id,
        "Coupon purchased"
    );
    Ok((StatusCode::CREATED, Json(instance)))
}

/// Purchase a cart of coupons atomically
///
/// POST /api/coupons/:salonId/purchase
pub async fn purchase_cart(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Json(req): Json<PurchaseCartRequest>,
) -> Result<(StatusCode, Json<Vec<CartItemReceipt>>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::validation_field("items", "Cart is empty"));
    }

    let receipts = state
        .coupons
        .purchase_coupons(req.customer_id, salon_id, &req.items)
        .await?;
    info!(
        customer = req.customer_id,
        salon = salon_id,
        items = receipts.len(),
        "Coupon cart purchased"
    );
    Ok((StatusCode::CREATED, Json(receipts)))
}

/// Redeem one purchased unit by coupon code
///
/// POST /api/coupons/:salonId/redeem
pub async fn redeem_coupon(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Json(req): Json<RedeemCouponRequest>,
) -> Result<Json<CouponRedemption>, ApiError> {
    let redemption = state
        .redemptions
        .redeem(req.customer_id, salon_id, &req.coupon_code)
        .await?;
    Ok(Json(redemption))
}

/// Every purchase instance a customer holds
///
/// GET /api/coupons/customer/:customerId
pub async fn customer_purchases(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
) -> Result<Json<Vec<PurchasedCoupon>>, ApiError> {
    let purchases = state.coupons.purchased_coupons(customer_id).await?;
    Ok(Json(purchases))
}
