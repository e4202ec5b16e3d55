//! Membership ledger: time-bounded entitlements that gate coupon
//! visibility and purchase at a salon.

use chrono::{Duration, Utc};
use sqlx::SqliteExecutor;

use super::{is_unique_violation, LedgerError};
use crate::db::{
    CreateMembershipPlanRequest, CustomerMembership, CustomerMembershipDetail, DbPool,
    MembershipPlan,
};

pub struct MembershipLedger {
    db: DbPool,
}

/// Active-status membership row for a (customer, salon) pair, usable from
/// inside another component's transaction.
pub(crate) async fn active_membership(
    executor: impl SqliteExecutor<'_>,
    customer_id: i64,
    salon_id: i64,
) -> Result<Option<CustomerMembership>, sqlx::Error> {
    sqlx::query_as::<_, CustomerMembership>(
        "SELECT * FROM customer_memberships \
         WHERE customer_id = ? AND salon_id = ? AND status = 'active'",
    )
    .bind(customer_id)
    .bind(salon_id)
    .fetch_optional(executor)
    .await
}

impl MembershipLedger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create_plan(
        &self,
        salon_id: i64,
        req: &CreateMembershipPlanRequest,
    ) -> Result<MembershipPlan, LedgerError> {
        if req.duration_days < 1 {
            return Err(LedgerError::InvalidDuration);
        }

        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO membership_plans (salon_id, name, description, price, duration_days, status, created_at) \
             VALUES (?, ?, ?, ?, ?, 'active', ?)",
        )
        .bind(salon_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.price)
        .bind(req.duration_days)
        .bind(&created_at)
        .execute(&self.db)
        .await?;

        let plan = sqlx::query_as::<_, MembershipPlan>("SELECT * FROM membership_plans WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.db)
            .await?;
        Ok(plan)
    }

    /// Active plans offered by a salon.
    pub async fn plans_for_salon(&self, salon_id: i64) -> Result<Vec<MembershipPlan>, LedgerError> {
        let plans = sqlx::query_as::<_, MembershipPlan>(
            "SELECT * FROM membership_plans WHERE salon_id = ? AND status = 'active'",
        )
        .bind(salon_id)
        .fetch_all(&self.db)
        .await?;
        Ok(plans)
    }

    /// Grant a customer a membership at a salon. The plan must belong to
    /// the salon; the membership runs from now for the plan's duration.
    /// A second purchase for the same salon is rejected as a conflict.
    pub async fn purchase_membership(
        &self,
        customer_id: i64,
        salon_id: i64,
        plan_id: i64,
    ) -> Result<CustomerMembership, LedgerError> {
        let mut tx = self.db.begin().await?;

        let plan = sqlx::query_as::<_, MembershipPlan>(
            "SELECT * FROM membership_plans WHERE id = ? AND salon_id = ?",
        )
        .bind(plan_id)
        .bind(salon_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::PlanNotFound)?;

        let start = Utc::now();
        let end = start + Duration::days(plan.duration_days);

        let result = sqlx::query(
            "INSERT INTO customer_memberships \
             (customer_id, salon_id, plan_id, start_date, end_date, status, created_at) \
             VALUES (?, ?, ?, ?, ?, 'active', ?)",
        )
        .bind(customer_id)
        .bind(salon_id)
        .bind(plan.id)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .bind(start.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::MembershipExists
            } else {
                LedgerError::Database(e)
            }
        })?;

        let membership =
            sqlx::query_as::<_, CustomerMembership>("SELECT * FROM customer_memberships WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(membership)
    }

    pub async fn has_active_membership(
        &self,
        customer_id: i64,
        salon_id: i64,
    ) -> Result<Option<CustomerMembership>, LedgerError> {
        Ok(active_membership(&self.db, customer_id, salon_id).await?)
    }

    /// All memberships a customer has held, newest first.
    pub async fn memberships_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<CustomerMembershipDetail>, LedgerError> {
        let rows = sqlx::query_as::<_, CustomerMembershipDetail>(
            "SELECT cm.id, cm.start_date, cm.end_date, cm.status, \
                    p.id AS plan_id, p.name AS plan_name, p.price, p.duration_days, \
                    s.id AS salon_id, s.name AS salon_name \
             FROM customer_memberships cm \
             JOIN membership_plans p ON cm.plan_id = p.id \
             JOIN salons s ON cm.salon_id = s.id \
             WHERE cm.customer_id = ? \
             ORDER BY cm.created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Memberships that have not yet lapsed, soonest-ending first.
    pub async fn active_memberships_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<CustomerMembershipDetail>, LedgerError> {
        let now = Utc::now().to_rfc3339();
        let rows = sqlx::query_as::<_, CustomerMembershipDetail>(
            "SELECT cm.id, cm.start_date, cm.end_date, cm.status, \
                    p.id AS plan_id, p.name AS plan_name, p.price, p.duration_days, \
                    s.id AS salon_id, s.name AS salon_name \
             FROM customer_memberships cm \
             JOIN membership_plans p ON cm.plan_id = p.id \
             JOIN salons s ON cm.salon_id = s.id \
             WHERE cm.customer_id = ? AND cm.end_date >= ? \
             ORDER BY cm.end_date ASC",
        )
        .bind(customer_id)
        .bind(&now)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testutil;

    #[tokio::test]
    async fn purchase_computes_end_date_from_plan_duration() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let plan = testutil::seed_plan(&pool, salon, 30).await;

        let ledger = MembershipLedger::new(pool);
        let membership = ledger
            .purchase_membership(customer, salon, plan)
            .await
            .unwrap();

        assert_eq!(membership.status, "active");
        let start = crate::ledger::parse_ts(&membership.start_date).unwrap();
        let end = crate::ledger::parse_ts(&membership.end_date).unwrap();
        assert_eq!(end - start, Duration::days(30));
    }

    #[tokio::test]
    async fn purchase_rejects_plan_from_another_salon() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let other = testutil::seed_salon(&pool, "Mane Event").await;
        let plan = testutil::seed_plan(&pool, other, 30).await;

        let ledger = MembershipLedger::new(pool);
        let err = ledger
            .purchase_membership(customer, salon, plan)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PlanNotFound));
    }

    #[tokio::test]
    async fn repurchase_same_salon_is_rejected() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let plan = testutil::seed_plan(&pool, salon, 30).await;

        let ledger = MembershipLedger::new(pool);
        ledger
            .purchase_membership(customer, salon, plan)
            .await
            .unwrap();
        let err = ledger
            .purchase_membership(customer, salon, plan)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MembershipExists));
    }

    #[tokio::test]
    async fn active_membership_lookup() {
        let pool = testutil::pool().await;
        let customer = testutil::seed_customer(&pool, "a@test.io").await;
        let salon = testutil::seed_salon(&pool, "Shear Genius").await;
        let plan = testutil::seed_plan(&pool, salon, 7).await;

        let ledger = MembershipLedger::new(pool);
        assert!(ledger
            .has_active_membership(customer, salon)
            .await
            .unwrap()
            .is_none());

        ledger
            .purchase_membership(customer, salon, plan)
            .await
            .unwrap();
        let found = ledger
            .has_active_membership(customer, salon)
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().plan_id, plan);
    }
}
