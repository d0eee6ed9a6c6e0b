//! Issued reward and reward definition repositories

use crate::db::DatabasePool;
use crate::models::{CreateIssuedReward, IssuedReward, RewardDefinition};
use async_trait::async_trait;
use dineloop_common::types::{CampaignId, RewardDefinitionId, TenantId};
use dineloop_common::{Error, Result};
use uuid::Uuid;

/// Issued reward repository trait
#[async_trait]
pub trait RewardRepository: Send + Sync {
    async fn create(&self, input: CreateIssuedReward) -> Result<IssuedReward>;
    /// Insert the whole batch in one transaction. Any failure rolls the
    /// entire batch back; callers retry at the campaign level.
    async fn create_batch(&self, inputs: Vec<CreateIssuedReward>) -> Result<Vec<IssuedReward>>;
    async fn code_exists(&self, tenant_id: TenantId, code: &str) -> Result<bool>;
    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<IssuedReward>>;
}

/// Reward definition repository trait
#[async_trait]
pub trait RewardDefinitionRepository: Send + Sync {
    async fn get(
        &self,
        tenant_id: TenantId,
        id: RewardDefinitionId,
    ) -> Result<Option<RewardDefinition>>;
}

/// Database issued reward repository
pub struct DbRewardRepository {
    pool: DatabasePool,
}

impl DbRewardRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardRepository for DbRewardRepository {
    async fn create(&self, input: CreateIssuedReward) -> Result<IssuedReward> {
        sqlx::query_as::<_, IssuedReward>(
            r#"
            INSERT INTO issued_rewards (
                id, tenant_id, campaign_id, client_id, reward_definition_id,
                prize_option_id, display_name, code, valid_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.campaign_id)
        .bind(input.client_id)
        .bind(input.reward_definition_id)
        .bind(input.prize_option_id)
        .bind(&input.display_name)
        .bind(&input.code)
        .bind(input.valid_until)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn create_batch(&self, inputs: Vec<CreateIssuedReward>) -> Result<Vec<IssuedReward>> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut created = Vec::with_capacity(inputs.len());

        for input in inputs {
            let reward = sqlx::query_as::<_, IssuedReward>(
                r#"
                INSERT INTO issued_rewards (
                    id, tenant_id, campaign_id, client_id, reward_definition_id,
                    prize_option_id, display_name, code, valid_until
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.tenant_id)
            .bind(input.campaign_id)
            .bind(input.client_id)
            .bind(input.reward_definition_id)
            .bind(input.prize_option_id)
            .bind(&input.display_name)
            .bind(&input.code)
            .bind(input.valid_until)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

            created.push(reward);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(created)
    }

    async fn code_exists(&self, tenant_id: TenantId, code: &str) -> Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM issued_rewards WHERE tenant_id = $1 AND code = $2",
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<IssuedReward>> {
        sqlx::query_as::<_, IssuedReward>(
            "SELECT * FROM issued_rewards WHERE campaign_id = $1 ORDER BY issued_at ASC",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Database reward definition repository
pub struct DbRewardDefinitionRepository {
    pool: DatabasePool,
}

impl DbRewardDefinitionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardDefinitionRepository for DbRewardDefinitionRepository {
    async fn get(
        &self,
        tenant_id: TenantId,
        id: RewardDefinitionId,
    ) -> Result<Option<RewardDefinition>> {
        sqlx::query_as::<_, RewardDefinition>(
            "SELECT * FROM reward_definitions WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
