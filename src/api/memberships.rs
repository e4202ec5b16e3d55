//! Membership endpoints, thin wrappers over the membership ledger.

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
    Coupon, CreateMembershipPlanRequest, CustomerMembership, CustomerMembershipDetail,
    MembershipPlan, PurchaseMembershipRequest,
};
use crate::AppState;

/// Create a membership plan for a salon
///
/// POST /api/memberships/:salonId/plans
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Json(req): Json<CreateMembershipPlanRequest>,
) -> Result<(StatusCode, Json<MembershipPlan>), ApiError> {
    if let Err(e) = validation::validate_display_name(&req.name) {
        return Err(ApiError::validation_field("name", e));
    }

    let salon: Option<(i64,)> = sqlx::query_as("SELECT id FROM salons WHERE id = ?")
        .bind(salon_id)
        .fetch_optional(&state.db)
        .await?;
    if salon.is_none() {
        return Err(ApiError::not_found("Salon not found"));
    }

    let plan = state.memberships.create_plan(salon_id, &req).await?;
    info!(salon = salon_id, plan = plan.id, "Membership plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

/// Active plans offered by a salon
///
/// GET /api/memberships/:salonId/plans
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
) -> Result<Json<Vec<MembershipPlan>>, ApiError> {
    let plans = state.memberships.plans_for_salon(salon_id).await?;
    Ok(Json(plans))
}

/// Purchase a membership at a salon
///
/// POST /api/memberships/:salonId/purchase
pub async fn purchase_membership(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<i64>,
    Json(req): Json<PurchaseMembershipRequest>,
) -> Result<(StatusCode, Json<CustomerMembership>), ApiError> {
    let membership = state
        .memberships
        .purchase_membership(req.customer_id, salon_id, req.plan_id)
        .await?;
    info!(
        customer = req.customer_id,
        salon = salon_id,
        plan = req.plan_id,
        "Membership purchased"
    );
    Ok((StatusCode::CREATED, Json(membership)))
}

/// Coupons visible to a member of a salon
///
/// GET /api/memberships/:salonId/customers/:customerId/coupons
pub async fn coupons_for_customer(
    State(state): State<Arc<AppState>>,
    Path((salon_id, customer_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<Coupon>>, ApiError> {
    let coupons = state.coupons.coupons_for_customer(customer_id, salon_id).await?;
    Ok(Json(coupons))
}

/// All memberships a customer has held
///
/// GET /api/memberships/customer/:customerId
pub async fn list_for_customer(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
) -> Result<Json<Vec<CustomerMembershipDetail>>, ApiError> {
    let memberships = state.memberships.memberships_for_customer(customer_id).await?;
    Ok(Json(memberships))
}

/// Memberships that have not yet lapsed
///
/// GET /api/memberships/customer/:customerId/active
pub async fn list_active_for_customer(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<i64>,
) -> Result<Json<Vec<CustomerMembershipDetail>>, ApiError> {
    let memberships = state
        .memberships
        .active_memberships_for_customer(customer_id)
        .await?;
    Ok(Json(memberships))
}
