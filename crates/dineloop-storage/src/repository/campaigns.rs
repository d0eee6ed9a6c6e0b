//! Campaign repository

use crate::db::DatabasePool;
use crate::models::{Campaign, CampaignStatus, CreateCampaign};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dineloop_common::types::{CampaignId, TenantId};
use dineloop_common::{Error, Result};
use uuid::Uuid;

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign>;
    async fn get(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>>;
    /// Cross-tenant lookup for engine-internal callbacks; the tenant comes
    /// back on the row and scopes everything downstream.
    async fn find(&self, id: CampaignId) -> Result<Option<Campaign>>;
    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>>;
    /// Atomically move a campaign from one of `from` to `to`, in a single
    /// conditional update. Returns `None` when the current status is not in
    /// `from`, leaving the row untouched.
    async fn try_transition(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Option<Campaign>>;
    async fn set_scheduled_at(
        &self,
        id: CampaignId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Accumulate per-run dispatch totals onto the campaign row
    async fn add_run_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()>;
}

/// Database campaign repository
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::new_v4();
        let audience = serde_json::to_value(&input.audience)
            .map_err(|e| Error::Internal(format!("Failed to encode audience: {}", e)))?;

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, tenant_id, name, message_template, reward_kind,
                reward_definition_id, prize_wheel_id, audience, dispatch_delay_ms,
                reward_valid_until, scheduled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.message_template)
        .bind(input.reward_kind.to_string())
        .bind(input.reward_definition_id)
        .bind(input.prize_wheel_id)
        .bind(&audience)
        .bind(input.dispatch_delay_ms.unwrap_or(0))
        .bind(input.reward_valid_until)
        .bind(input.scheduled_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.to_string())
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn try_transition(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();

        let started_at = if to == CampaignStatus::Processing {
            Some(Utc::now())
        } else {
            None
        };

        let completed_at = if matches!(to, CampaignStatus::Sent | CampaignStatus::Failed) {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.to_string())
        .bind(started_at)
        .bind(completed_at)
        .bind(&from)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_scheduled_at(
        &self,
        id: CampaignId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE campaigns SET scheduled_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(scheduled_at)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn add_run_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                send_count = send_count + $2,
                failure_count = failure_count + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
