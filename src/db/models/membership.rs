//! Membership plan and customer membership models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipPlan {
    pub id: i64,
    pub salon_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_days: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerMembership {
    pub id: i64,
    pub customer_id: i64,
    pub salon_id: i64,
    pub plan_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub created_at: String,
}

/// Customer membership joined with its plan and salon for listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerMembershipDetail {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub plan_id: i64,
    pub plan_name: String,
    pub price: f64,
    pub duration_days: i64,
    pub salon_id: i64,
    pub salon_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipPlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseMembershipRequest {
    pub customer_id: i64,
    pub plan_id: i64,
}
