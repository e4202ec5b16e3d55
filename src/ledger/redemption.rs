//! Redemption engine: converts an owned, still-active purchase instance
//! into its terminal `used` state and appends an immutable audit record.
//!
//! Instance state machine: active -> used (here) or active -> expired
//! (sweep). Both are terminal.

use chrono::Utc;

use super::{check_validity_window, LedgerError};
use crate::db::{Coupon, CouponRedemption, CustomerCoupon, DbPool};

pub struct RedemptionEngine {
    db: DbPool,
}

impl RedemptionEngine {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Redeem one purchased unit of the coupon identified by (salon, code).
    ///
    /// Runs as a single transaction; any failure rolls the whole thing
    /// back. The usage-limit check and the audit append are one guarded
    /// INSERT, and the instance flip is conditioned on the row still being
    /// active, so two racing redemptions cannot both succeed past the cap.
    pub async fn redeem(
        &self,
        customer_id: i64,
        salon_id: i64,
        coupon_code: &str,
    ) -> Result<CouponRedemption, LedgerError> {
        let mut tx = self.db.begin().await?;

        let coupon =
            sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE salon_id = ? AND code = ?")
                .bind(salon_id)
                .bind(coupon_code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(LedgerError::CouponNotFound)?;

        let now = Utc::now();
        check_validity_window(&coupon, now)?;

        // Oldest still-active purchase instance owned by the customer
        let instance = sqlx::query_as::<_, CustomerCoupon>(
            "SELECT * FROM customer_coupons \
             WHERE customer_id = ? AND coupon_id = ? AND status = 'active' \
             ORDER BY purchased_at ASC, id ASC LIMIT 1",
        )
        .bind(customer_id)
        .bind(coupon.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::NoActivePurchase)?;

        // Append the audit row only while the redeemed count is below the
        // global cap; zero rows affected means the limit was reached.
        let inserted = sqlx::query(
            "INSERT INTO coupon_redemptions (coupon_id, customer_id, status, redeemed_at) \
             SELECT ?, ?, 'redeemed', ? \
             WHERE (SELECT COUNT(*) FROM coupon_redemptions \
                    WHERE coupon_id = ? AND status = 'redeemed') < ?",
        )
        .bind(coupon.id)
        .bind(customer_id)
        .bind(now.to_rfc3339())
        .bind(coupon.id)
        .bind(coupon.max_usage)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(LedgerError::UsageLimitReached);
        }

        let flipped =
            sqlx::query("UPDATE customer_coupons SET status = 'used' WHERE id = ? AND status = 'active'")
                .bind(instance.id)
                .execute(&mut *tx)
                .await?;
        if flipped.rows_affected() == 0 {
            return Err(LedgerError::NoActivePurchase);
        }

        let redemption =
            sqlx::query_as::<_, CouponRedemption>("SELECT * FROM coupon_redemptions WHERE id = ?")
                .bind(inserted.last_insert_rowid())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        tracing::info!(
            coupon = %coupon.code,
            salon = coupon.salon_id,
            customer = customer_id,
            "Coupon redeemed"
        );
        Ok(redemption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CartItem;
    use crate::ledger::testutil;
    use crate::ledger::CouponLedger;

    async fn instance_status(pool: &DbPool, id: i64) -> String {
        let (status,): (String,) =
            sqlx::query_as("SELECT status FROM customer_coupons WHERE id = ?")
                .bind(id)
                .fetch_one(pool)
                .await
                .unwrap();
        status
    }

    async fn redemption_count(pool: &DbPool, coupon_id: i64) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = ? AND status = 'redeemed'",
        )
        .bind(coupon_id)
        .fetch_one(pool)
        .await
        .unwrap();
        count
    }

    #[tokio::test]
    async fn redeem_flips_instance_and_appends_audit_row() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_membership(&pool, customer, salon).await;
        let coupon = testutil::seed_coupon(&pool, salon, "WELCOME10", -7, 180, 100).await;

        let coupons = CouponLedger::new(pool.clone());
        let instance = coupons.buy_coupon(customer, salon, coupon).await.unwrap();

        let engine = RedemptionEngine::new(pool.clone());
        let redemption = engine.redeem(customer, salon, "WELCOME10").await.unwrap();

        assert_eq!(redemption.status, "redeemed");
        assert_eq!(redemption.coupon_id, coupon);
        assert_eq!(instance_status(&pool, instance.id).await, "used");

        // The instance is consumed; a second redemption has nothing to use
        let err = engine.redeem(customer, salon, "WELCOME10").await.unwrap_err();
        assert!(matches!(err, LedgerError::NoActivePurchase));
        assert_eq!(redemption_count(&pool, coupon).await, 1);
    }

    #[tokio::test]
    async fn redeem_requires_prior_purchase() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_coupon(&pool, salon, "WELCOME10", -7, 180, 100).await;

        let engine = RedemptionEngine::new(pool);
        let err = engine.redeem(customer, salon, "WELCOME10").await.unwrap_err();
        assert!(matches!(err, LedgerError::NoActivePurchase));
    }

    #[tokio::test]
    async fn redeem_rejects_unknown_code_and_wrong_salon() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let other = testutil::seed_salon(&pool, "Mane Event").await;
        testutil::seed_coupon(&pool, salon, "WELCOME10", -7, 180, 100).await;

        let engine = RedemptionEngine::new(pool);
        let err = engine.redeem(customer, salon, "NOPE").await.unwrap_err();
        assert!(matches!(err, LedgerError::CouponNotFound));

        // Same code, different salon: scoped lookup must miss
        let err = engine.redeem(customer, other, "WELCOME10").await.unwrap_err();
        assert!(matches!(err, LedgerError::CouponNotFound));
    }

    #[tokio::test]
    async fn redeem_rejects_past_and_future_windows() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_coupon(&pool, salon, "LASTYEAR", -400, -35, 100).await;
        testutil::seed_coupon(&pool, salon, "NEXTYEAR", 35, 400, 100).await;

        let engine = RedemptionEngine::new(pool);
        for code in ["LASTYEAR", "NEXTYEAR"] {
            let err = engine.redeem(customer, salon, code).await.unwrap_err();
            assert!(matches!(err, LedgerError::OutsideValidityWindow));
        }
    }

    #[tokio::test]
    async fn usage_limit_failure_changes_nothing() {
        let pool = testutil::pool().await;
        let first = testutil::seed_customer(&pool, "a@test.io").await;
        let second = testutil::seed_customer(&pool, "b@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        // Global cap of one redemption
        let coupon = testutil::seed_coupon(&pool, salon, "ONEONLY", -7, 180, 1).await;

        let coupons = CouponLedger::new(pool.clone());
        let receipts = coupons
            .purchase_coupons(
                first,
                salon,
                &[CartItem {
                    coupon_id: coupon,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();
        assert_eq!(receipts.len(), 1);
        coupons
            .purchase_coupons(
                second,
                salon,
                &[CartItem {
                    coupon_id: coupon,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();

        let engine = RedemptionEngine::new(pool.clone());
        engine.redeem(first, salon, "ONEONLY").await.unwrap();

        let err = engine.redeem(second, salon, "ONEONLY").await.unwrap_err();
        assert!(matches!(err, LedgerError::UsageLimitReached));

        // The second customer's instance is untouched and no extra audit row exists
        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM customer_coupons WHERE customer_id = ? AND status = 'active'",
        )
        .bind(second)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active, 1);
        assert_eq!(redemption_count(&pool, coupon).await, 1);
    }
}
