//! The commerce core: membership entitlements, coupon purchases and
//! redemptions over the shared store.
//!
//! Each component is constructed with the pool it operates on; every
//! multi-step mutation runs inside a single transaction so a failure at
//! any step leaves the store untouched.

pub mod coupons;
pub mod memberships;
pub mod redemption;
pub mod sweep;

pub use coupons::CouponLedger;
pub use memberships::MembershipLedger;
pub use redemption::RedemptionEngine;
pub use sweep::{spawn_sweep_task, CouponSweep, SweepStats};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::Coupon;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("coupon not found for this salon")]
    CouponNotFound,
    #[error("membership plan not found for this salon")]
    PlanNotFound,
    #[error("a coupon with this code already exists for this salon")]
    DuplicateCode,
    #[error("customer already holds a membership at this salon")]
    MembershipExists,
    #[error("customer does not have an active membership for this salon")]
    MembershipRequired,
    #[error("coupon is inactive")]
    CouponInactive,
    #[error("coupon expired or not active yet")]
    OutsideValidityWindow,
    #[error("no active purchased coupon found for this customer")]
    NoActivePurchase,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("duration must be at least one day")]
    InvalidDuration,
    #[error("timestamp is not valid RFC 3339")]
    InvalidTimestamp,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Detect a UNIQUE constraint violation so it can be mapped to a
/// domain-specific conflict instead of a generic database error.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LedgerError::InvalidTimestamp)
}

/// A coupon is redeemable/purchasable only while `valid_from <= now <= valid_to`.
pub(crate) fn check_validity_window(coupon: &Coupon, now: DateTime<Utc>) -> Result<(), LedgerError> {
    let from = parse_ts(&coupon.valid_from)?;
    let to = parse_ts(&coupon.valid_to)?;
    if now < from || now > to {
        return Err(LedgerError::OutsideValidityWindow);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{Duration, Utc};

    use crate::db::DbPool;

    pub async fn pool() -> DbPool {
        crate::db::init_in_memory()
            .await
            .expect("in-memory database")
    }

    pub async fn seed_customer(pool: &DbPool, email: &str) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (email, password_hash, name, role, created_at, updated_at) \
             VALUES (?, '', 'Test Customer', 'customer', ?, ?)",
        )
        .bind(email)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .expect("seed customer")
        .last_insert_rowid()
    }

    pub async fn seed_salon(pool: &DbPool, name: &str) -> i64 {
        let now = Utc::now().to_rfc3339();
        let city_id = sqlx::query("INSERT INTO cities (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(format!("{name} City"))
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await
            .expect("seed city")
            .last_insert_rowid();
        sqlx::query(
            "INSERT INTO salons (city_id, name, phone, address, created_at, updated_at) \
             VALUES (?, ?, '555-0100', '1 Main St', ?, ?)",
        )
        .bind(city_id)
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .expect("seed salon")
        .last_insert_rowid()
    }

    pub async fn seed_plan(pool: &DbPool, salon_id: i64, duration_days: i64) -> i64 {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO membership_plans (salon_id, name, price, duration_days, status, created_at) \
             VALUES (?, 'Gold', 49.99, ?, 'active', ?)",
        )
        .bind(salon_id)
        .bind(duration_days)
        .bind(&now)
        .execute(pool)
        .await
        .expect("seed plan")
        .last_insert_rowid()
    }

    pub async fn seed_membership(pool: &DbPool, customer_id: i64, salon_id: i64) -> i64 {
        let plan_id = seed_plan(pool, salon_id, 30).await;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO customer_memberships \
             (customer_id, salon_id, plan_id, start_date, end_date, status, created_at) \
             VALUES (?, ?, ?, ?, ?, 'active', ?)",
        )
        .bind(customer_id)
        .bind(salon_id)
        .bind(plan_id)
        .bind(now.to_rfc3339())
        .bind((now + Duration::days(30)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(pool)
        .await
        .expect("seed membership")
        .last_insert_rowid()
    }

    /// Coupon valid from `from_days` to `to_days` relative to now (negative = past).
    pub async fn seed_coupon(
        pool: &DbPool,
        salon_id: i64,
        code: &str,
        from_days: i64,
        to_days: i64,
        max_usage: i64,
    ) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO coupons \
             (salon_id, code, description, discount, price, max_usage, valid_from, valid_to, status, created_at) \
             VALUES (?, ?, 'Test coupon', 10.0, 5.0, ?, ?, ?, 'active', ?)",
        )
        .bind(salon_id)
        .bind(code)
        .bind(max_usage)
        .bind((now + Duration::days(from_days)).to_rfc3339())
        .bind((now + Duration::days(to_days)).to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(pool)
        .await
        .expect("seed coupon")
        .last_insert_rowid()
    }
}
