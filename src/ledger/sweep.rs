//! Expired-coupon sweep.
//!
//! Runs on a fixed schedule (daily at midnight by default) and, outside of
//! any purchase/redemption transaction:
//! 1. collects coupons whose validity window has closed;
//! 2. marks their still-active purchase instances as expired (used rows
//!    are left untouched);
//! 3. deletes the coupon rows themselves — FK cascade removes any
//!    remaining instances and redemption records.

use anyhow::Result;
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;

use crate::config::CleanupConfig;
use crate::db::DbPool;

pub struct CouponSweep {
    db: DbPool,
}

/// Statistics from a sweep run
#[derive(Debug, Default)]
pub struct SweepStats {
    pub instances_expired: u64,
    pub coupons_deleted: u64,
}

impl CouponSweep {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Run a single sweep cycle.
    pub async fn run_sweep(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        // Timestamps are RFC 3339 UTC strings, so they order lexicographically
        let now = Utc::now().to_rfc3339();

        let (lapsed,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons WHERE valid_to < ?")
            .bind(&now)
            .fetch_one(&self.db)
            .await?;

        if lapsed == 0 {
            tracing::debug!("No expired coupons found, nothing to sweep");
            return Ok(stats);
        }

        tracing::info!(count = lapsed, "Found expired coupons to sweep");

        let expired = sqlx::query(
            "UPDATE customer_coupons SET status = 'expired' \
             WHERE status = 'active' \
               AND coupon_id IN (SELECT id FROM coupons WHERE valid_to < ?)",
        )
        .bind(&now)
        .execute(&self.db)
        .await?;
        stats.instances_expired = expired.rows_affected();

        let deleted = sqlx::query("DELETE FROM coupons WHERE valid_to < ?")
            .bind(&now)
            .execute(&self.db)
            .await?;
        stats.coupons_deleted = deleted.rows_affected();

        tracing::info!(
            instances_expired = stats.instances_expired,
            coupons_deleted = stats.coupons_deleted,
            "Sweep cycle completed"
        );

        Ok(stats)
    }
}

/// Spawn the background sweep task
pub fn spawn_sweep_task(db: DbPool, config: CleanupConfig) {
    if !config.enabled {
        tracing::info!("Coupon sweep is disabled");
        return;
    }

    let schedule = match Schedule::from_str(&config.schedule) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(schedule = %config.schedule, error = %e, "Invalid sweep schedule");
            return;
        }
    };

    tracing::info!(schedule = %config.schedule, "Starting coupon sweep task");

    let sweep = CouponSweep::new(db);

    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!("Sweep schedule has no upcoming runs, stopping");
                break;
            };
            let wait = (next - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;

            if let Err(e) = sweep.run_sweep().await {
                tracing::error!(error = %e, "Sweep cycle failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil;
    use crate::ledger::{LedgerError, RedemptionEngine};

    #[tokio::test]
    async fn sweep_expires_active_instances_and_deletes_coupons() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let lapsed = testutil::seed_coupon(&pool, salon, "LASTYEAR", -60, -1, 100).await;
        let current = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;

        // One still-active and one already-used instance of the lapsed coupon
        let purchased_at = Utc::now().to_rfc3339();
        for status in ["active", "used"] {
            sqlx::query(
                "INSERT INTO customer_coupons (coupon_id, customer_id, status, purchased_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(lapsed)
            .bind(customer)
            .bind(status)
            .bind(&purchased_at)
            .execute(&pool)
            .await
            .unwrap();
        }

        let stats = CouponSweep::new(pool.clone()).run_sweep().await.unwrap();
        assert_eq!(stats.instances_expired, 1);
        assert_eq!(stats.coupons_deleted, 1);

        // The lapsed coupon and its instances are gone via cascade
        let (coupons,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(coupons, 1);
        let (instances,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customer_coupons")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(instances, 0);

        // The in-window coupon is untouched
        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons WHERE id = ?")
            .bind(current)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn sweep_leaves_used_rows_untouched_before_delete() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let lapsed = testutil::seed_coupon(&pool, salon, "LASTYEAR", -60, -1, 100).await;

        let purchased_at = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO customer_coupons (coupon_id, customer_id, status, purchased_at) \
             VALUES (?, ?, 'used', ?)",
        )
        .bind(lapsed)
        .bind(customer)
        .bind(&purchased_at)
        .execute(&pool)
        .await
        .unwrap();

        let stats = CouponSweep::new(pool).run_sweep().await.unwrap();
        // The used instance is never flipped to expired
        assert_eq!(stats.instances_expired, 0);
        assert_eq!(stats.coupons_deleted, 1);
    }

    #[tokio::test]
    async fn redemption_racing_a_sweep_sees_coupon_not_found() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let lapsed = testutil::seed_coupon(&pool, salon, "LASTYEAR", -60, -1, 100).await;

        let purchased_at = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO customer_coupons (coupon_id, customer_id, status, purchased_at) \
             VALUES (?, ?, 'active', ?)",
        )
        .bind(lapsed)
        .bind(customer)
        .bind(&purchased_at)
        .execute(&pool)
        .await
        .unwrap();

        CouponSweep::new(pool.clone()).run_sweep().await.unwrap();

        let err = RedemptionEngine::new(pool)
            .redeem(customer, salon, "LASTYEAR")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CouponNotFound));
    }
}
