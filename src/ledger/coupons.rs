//! Coupon catalog and purchase ledger.
//!
//! Purchases create redeemable instances (`customer_coupons` rows); the
//! scarce, audited act of consuming one lives in [`super::redemption`].

use chrono::Utc;

use super::{check_validity_window, is_unique_violation, LedgerError};
use crate::db::{
    CartItem, CartItemReceipt, Coupon, CreateCouponRequest, CustomerCoupon, DbPool,
    PurchasedCoupon, COUPON_ACTIVE,
};

pub struct CouponLedger {
    db: DbPool,
}

impl CouponLedger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a coupon scoped to a salon. Codes are unique per salon.
    pub async fn create_coupon(
        &self,
        salon_id: i64,
        req: &CreateCouponRequest,
    ) -> Result<Coupon, LedgerError> {
        // Reject malformed windows up front
        let from = super::parse_ts(&req.valid_from)?;
        let to = super::parse_ts(&req.valid_to)?;
        if to < from {
            return Err(LedgerError::InvalidTimestamp);
        }

        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO coupons \
             (salon_id, code, description, discount, price, max_usage, valid_from, valid_to, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)",
        )
        .bind(salon_id)
        .bind(&req.code)
        .bind(&req.description)
        .bind(req.discount)
        .bind(req.price)
        .bind(req.max_usage)
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .bind(&created_at)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateCode
            } else {
                LedgerError::Database(e)
            }
        })?;

        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.db)
            .await?;
        Ok(coupon)
    }

    pub async fn coupons_for_salon(&self, salon_id: i64) -> Result<Vec<Coupon>, LedgerError> {
        let coupons = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE salon_id = ?")
            .bind(salon_id)
            .fetch_all(&self.db)
            .await?;
        Ok(coupons)
    }

    pub async fn all_coupons(&self) -> Result<Vec<Coupon>, LedgerError> {
        let coupons = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons")
            .fetch_all(&self.db)
            .await?;
        Ok(coupons)
    }

    /// Coupons visible to a customer: requires an active membership at the
    /// salon, then returns the salon's active coupons.
    pub async fn coupons_for_customer(
        &self,
        customer_id: i64,
        salon_id: i64,
    ) -> Result<Vec<Coupon>, LedgerError> {
        let membership =
            super::memberships::active_membership(&self.db, customer_id, salon_id).await?;
        if membership.is_none() {
            return Err(LedgerError::MembershipRequired);
        }

        let coupons = sqlx::query_as::<_, Coupon>(
            "SELECT * FROM coupons WHERE salon_id = ? AND status = ?",
        )
        .bind(salon_id)
        .bind(COUPON_ACTIVE)
        .fetch_all(&self.db)
        .await?;
        Ok(coupons)
    }

    /// Buy one redeemable unit of a coupon. Requires an active membership;
    /// the coupon must be active and inside its validity window.
    pub async fn buy_coupon(
        &self,
        customer_id: i64,
        salon_id: i64,
        coupon_id: i64,
    ) -> Result<CustomerCoupon, LedgerError> {
        let mut tx = self.db.begin().await?;

        let membership =
            super::memberships::active_membership(&mut *tx, customer_id, salon_id).await?;
        if membership.is_none() {
            return Err(LedgerError::MembershipRequired);
        }

        let now = Utc::now();
        let coupon = load_purchasable(&mut tx, salon_id, coupon_id, now).await?;

        let result = sqlx::query(
            "INSERT INTO customer_coupons (coupon_id, customer_id, status, purchased_at) \
             VALUES (?, ?, 'active', ?)",
        )
        .bind(coupon.id)
        .bind(customer_id)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let instance =
            sqlx::query_as::<_, CustomerCoupon>("SELECT * FROM customer_coupons WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(instance)
    }

    /// Purchase a cart of coupons in one transaction. Every item is
    /// validated independently; any invalid item aborts the whole cart.
    pub async fn purchase_coupons(
        &self,
        customer_id: i64,
        salon_id: i64,
        items: &[CartItem],
    ) -> Result<Vec<CartItemReceipt>, LedgerError> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now();
        let purchased_at = now.to_rfc3339();
        let mut receipts = Vec::with_capacity(items.len());

        for item in items {
            if item.quantity < 1 {
                return Err(LedgerError::InvalidQuantity);
            }

            let coupon = load_purchasable(&mut tx, salon_id, item.coupon_id, now).await?;

            for _ in 0..item.quantity {
                sqlx::query(
                    "INSERT INTO customer_coupons (coupon_id, customer_id, status, purchased_at) \
                     VALUES (?, ?, 'active', ?)",
                )
                .bind(coupon.id)
                .bind(customer_id)
                .bind(&purchased_at)
                .execute(&mut *tx)
                .await?;
            }

            receipts.push(CartItemReceipt {
                coupon_id: coupon.id,
                quantity: item.quantity,
            });
        }

        tx.commit().await?;
        Ok(receipts)
    }

    /// Every purchase instance a customer holds, joined with its coupon.
    /// No status filter; callers distinguish active/used/expired.
    pub async fn purchased_coupons(
        &self,
        customer_id: i64,
    ) -> Result<Vec<PurchasedCoupon>, LedgerError> {
        let rows = sqlx::query_as::<_, PurchasedCoupon>(
            "SELECT cc.id AS purchase_id, cc.status AS purchase_status, cc.purchased_at, \
                    c.id AS coupon_id, c.salon_id, c.code, c.description, c.discount, c.price, \
                    c.valid_from, c.valid_to \
             FROM customer_coupons cc \
             JOIN coupons c ON cc.coupon_id = c.id \
             WHERE cc.customer_id = ? \
             ORDER BY cc.purchased_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// Load a coupon scoped to a salon and check it can be purchased now.
async fn load_purchasable(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    salon_id: i64,
    coupon_id: i64,
    now: chrono::DateTime<Utc>,
) -> Result<Coupon, LedgerError> {
    let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = ? AND salon_id = ?")
        .bind(coupon_id)
        .bind(salon_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::CouponNotFound)?;

    if coupon.status != COUPON_ACTIVE {
        return Err(LedgerError::CouponInactive);
    }
    check_validity_window(&coupon, now)?;
    Ok(coupon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil;

    async fn count_instances(pool: &DbPool, customer_id: i64) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM customer_coupons WHERE customer_id = ?")
                .bind(customer_id)
                .fetch_one(pool)
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn buy_requires_active_membership() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let coupon = testutil::seed_coupon(&pool, salon, "WELCOME10", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let err = ledger.buy_coupon(customer, salon, coupon).await.unwrap_err();
        assert!(matches!(err, LedgerError::MembershipRequired));
        assert_eq!(count_instances(&pool, customer).await, 0);
    }

    #[tokio::test]
    async fn buy_creates_one_active_instance() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_membership(&pool, customer, salon).await;
        let coupon = testutil::seed_coupon(&pool, salon, "WELCOME10", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let instance = ledger.buy_coupon(customer, salon, coupon).await.unwrap();
        assert_eq!(instance.status, "active");
        assert_eq!(instance.coupon_id, coupon);
        assert_eq!(count_instances(&pool, customer).await, 1);
    }

    #[tokio::test]
    async fn buy_rejects_out_of_window_coupons() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_membership(&pool, customer, salon).await;
        let past = testutil::seed_coupon(&pool, salon, "LASTYEAR", -60, -30, 100).await;
        let future = testutil::seed_coupon(&pool, salon, "NEXTYEAR", 30, 60, 100).await;

        let ledger = CouponLedger::new(pool);
        for coupon in [past, future] {
            let err = ledger.buy_coupon(customer, salon, coupon).await.unwrap_err();
            assert!(matches!(err, LedgerError::OutsideValidityWindow));
        }
    }

    #[tokio::test]
    async fn cart_inserts_quantity_rows_per_item() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let first = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;
        let second = testutil::seed_coupon(&pool, salon, "SPA5", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let receipts = ledger
            .purchase_coupons(
                customer,
                salon,
                &[
                    CartItem {
                        coupon_id: first,
                        quantity: 3,
                    },
                    CartItem {
                        coupon_id: second,
                        quantity: 2,
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(count_instances(&pool, customer).await, 5);

        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM customer_coupons WHERE customer_id = ? AND status = 'active'",
        )
        .bind(customer)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active, 5);
    }

    #[tokio::test]
    async fn cart_is_all_or_nothing() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let good = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;
        let expired = testutil::seed_coupon(&pool, salon, "LASTYEAR", -60, -30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let err = ledger
            .purchase_coupons(
                customer,
                salon,
                &[
                    CartItem {
                        coupon_id: good,
                        quantity: 2,
                    },
                    CartItem {
                        coupon_id: expired,
                        quantity: 1,
                    },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::OutsideValidityWindow));
        assert_eq!(count_instances(&pool, customer).await, 0);
    }

    #[tokio::test]
    async fn cart_rejects_zero_quantity() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let coupon = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let err = ledger
            .purchase_coupons(
                customer,
                salon,
                &[CartItem {
                    coupon_id: coupon,
                    quantity: 0,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity));
        assert_eq!(count_instances(&pool, customer).await, 0);
    }

    #[tokio::test]
    async fn visibility_is_gated_by_membership() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool.clone());
        let err = ledger
            .coupons_for_customer(customer, salon)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MembershipRequired));

        testutil::seed_membership(&pool, customer, salon).await;
        let visible = ledger.coupons_for_customer(customer, salon).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].code, "CUT20");
    }

    #[tokio::test]
    async fn purchased_coupons_joins_definition() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        testutil::seed_membership(&pool, customer, salon).await;
        let coupon = testutil::seed_coupon(&pool, salon, "CUT20", -1, 30, 100).await;

        let ledger = CouponLedger::new(pool);
        ledger.buy_coupon(customer, salon, coupon).await.unwrap();

        let purchased = ledger.purchased_coupons(customer).await.unwrap();
        assert_eq!(purchased.len(), 1);
        assert_eq!(purchased[0].code, "CUT20");
        assert_eq!(purchased[0].purchase_status, "active");
        assert_eq!(purchased[0].salon_id, salon);
    }
}
