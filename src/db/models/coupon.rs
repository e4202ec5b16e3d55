//! Coupon catalog, purchase instance and redemption models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const COUPON_ACTIVE: &str = "active";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub salon_id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount: f64,
    pub price: f64,
    pub max_usage: i64,
    pub valid_from: String,
    pub valid_to: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerCoupon {
    pub id: i64,
    pub coupon_id: i64,
    pub customer_id: i64,
    pub status: String,
    pub purchased_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CouponRedemption {
    pub id: i64,
    pub coupon_id: i64,
    pub customer_id: i64,
    pub status: String,
    pub redeemed_at: String,
}

/// Purchase instance joined with its coupon definition
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchasedCoupon {
    pub purchase_id: i64,
    pub purchase_status: String,
    pub purchased_at: String,
    pub coupon_id: i64,
    pub salon_id: i64,
    pub code: String,
    pub description: Option<String>,
    pub discount: f64,
    pub price: f64,
    pub valid_from: String,
    pub valid_to: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    pub code: String,
    pub description: Option<String>,
    pub discount: f64,
    #[serde(default)]
    pub price: f64,
    pub max_usage: i64,
    pub valid_from: String,
    pub valid_to: String,
}

#[derive(Debug, Deserialize)]
pub struct BuyCouponRequest {
    pub customer_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub coupon_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PurchaseCartRequest {
    pub customer_id: i64,
    pub items: Vec<CartItem>,
}

/// Per-item outcome of a cart purchase
#[derive(Debug, Serialize)]
pub struct CartItemReceipt {
    pub coupon_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RedeemCouponRequest {
    pub customer_id: i64,
    pub coupon_code: String,
}
