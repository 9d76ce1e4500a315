use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    services::simulator::PaymentSimulator,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    pub simulator: Arc<PaymentSimulator>,
}

impl AppState {
    /// Build state over a single sqlx pool, with the simulator configured from `config`.
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let simulator = PaymentSimulator::from_config(&config);
        Self::with_simulator(pool, config, simulator)
    }

    pub fn with_simulator(pool: DbPool, config: AppConfig, simulator: PaymentSimulator) -> Self {
        let orm = crate::db::orm_from_pool(pool.clone());
        Self {
            pool,
            orm,
            config,
            simulator: Arc::new(simulator),
        }
    }
}
