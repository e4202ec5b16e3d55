pub mod api;
pub mod config;
pub mod db;
pub mod ledger;
pub mod storage;

pub use db::DbPool;

use config::Config;
use ledger::{CouponLedger, MembershipLedger, RedemptionEngine};
use std::sync::Arc;
use storage::ObjectStorage;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub storage: Arc<dyn ObjectStorage>,
    pub memberships: MembershipLedger,
    pub coupons: CouponLedger,
    pub redemptions: RedemptionEngine,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, storage: Arc<dyn ObjectStorage>) -> Self {
        let memberships = MembershipLedger::new(db.clone());
        let coupons = CouponLedger::new(db.clone());
        let redemptions = RedemptionEngine::new(db.clone());
        Self {
            config,
            db,
            storage,
            memberships,
            coupons,
            redemptions,
        }
    }
}
