//! Dispatch record repository

use crate::db::DatabasePool;
use crate::models::{CreateDispatchRecord, DispatchCounts, DispatchRecord};
use async_trait::async_trait;
use dineloop_common::types::{CampaignId, ClientId};
use dineloop_common::{Error, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// Dispatch record repository trait
#[async_trait]
pub trait DispatchRecordRepository: Send + Sync {
    async fn record(&self, input: CreateDispatchRecord) -> Result<DispatchRecord>;
    /// Clients a campaign already delivered to; re-runs skip these
    async fn sent_client_ids(&self, campaign_id: CampaignId) -> Result<HashSet<ClientId>>;
    async fn counts_by_campaign(&self, campaign_id: CampaignId) -> Result<DispatchCounts>;
}

/// Database dispatch record repository
pub struct DbDispatchRecordRepository {
    pool: DatabasePool,
}

impl DbDispatchRecordRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchRecordRepository for DbDispatchRecordRepository {
    async fn record(&self, input: CreateDispatchRecord) -> Result<DispatchRecord> {
        sqlx::query_as::<_, DispatchRecord>(
            r#"
            INSERT INTO dispatch_records (
                id, tenant_id, campaign_id, client_id, address, outcome, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.campaign_id)
        .bind(input.client_id)
        .bind(&input.address)
        .bind(input.outcome.to_string())
        .bind(&input.error)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn sent_client_ids(&self, campaign_id: CampaignId) -> Result<HashSet<ClientId>> {
        let rows: Vec<(ClientId,)> = sqlx::query_as(
            "SELECT client_id FROM dispatch_records WHERE campaign_id = $1 AND outcome = 'sent'",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn counts_by_campaign(&self, campaign_id: CampaignId) -> Result<DispatchCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT outcome, COUNT(*) FROM dispatch_records
            WHERE campaign_id = $1
            GROUP BY outcome
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let mut counts = DispatchCounts::default();
        for (outcome, count) in rows {
            match outcome.as_str() {
                "sent" => counts.sent = count,
                "failed" => counts.failed = count,
                _ => {}
            }
        }
        Ok(counts)
    }
}
