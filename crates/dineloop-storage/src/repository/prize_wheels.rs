//! Prize wheel repository

use crate::db::DatabasePool;
use crate::models::{PrizeOption, PrizeWheel};
use async_trait::async_trait;
use dineloop_common::types::{PrizeWheelId, TenantId};
use dineloop_common::{Error, Result};

/// Prize wheel repository trait
#[async_trait]
pub trait PrizeWheelRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: PrizeWheelId) -> Result<Option<PrizeWheel>>;
    /// Options of a wheel in insertion order; draw ties break on that order
    async fn list_options(&self, wheel_id: PrizeWheelId) -> Result<Vec<PrizeOption>>;
}

/// Database prize wheel repository
pub struct DbPrizeWheelRepository {
    pool: DatabasePool,
}

impl DbPrizeWheelRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrizeWheelRepository for DbPrizeWheelRepository {
    async fn get(&self, tenant_id: TenantId, id: PrizeWheelId) -> Result<Option<PrizeWheel>> {
        sqlx::query_as::<_, PrizeWheel>(
            "SELECT * FROM prize_wheels WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_options(&self, wheel_id: PrizeWheelId) -> Result<Vec<PrizeOption>> {
        sqlx::query_as::<_, PrizeOption>(
            "SELECT * FROM prize_options WHERE prize_wheel_id = $1 ORDER BY created_at ASC",
        )
        .bind(wheel_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
