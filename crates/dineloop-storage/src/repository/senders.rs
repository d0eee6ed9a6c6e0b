//! Sender resource repository

use crate::db::DatabasePool;
use crate::models::Sender;
use async_trait::async_trait;
use dineloop_common::types::SenderId;
use dineloop_common::{Error, Result};

/// Sender repository trait
#[async_trait]
pub trait SenderRepository: Send + Sync {
    /// Any sender with remaining quota. The capacity probe is deliberately
    /// not scoped to a tenant; see the availability monitor.
    async fn find_available(&self) -> Result<Option<Sender>>;
    async fn add_sent(&self, id: SenderId, count: i32) -> Result<()>;
}

/// Database sender repository
pub struct DbSenderRepository {
    pool: DatabasePool,
}

impl DbSenderRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SenderRepository for DbSenderRepository {
    async fn find_available(&self) -> Result<Option<Sender>> {
        sqlx::query_as::<_, Sender>(
            r#"
            SELECT * FROM senders
            WHERE active AND sent_today < daily_quota
            ORDER BY sent_today ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn add_sent(&self, id: SenderId, count: i32) -> Result<()> {
        sqlx::query(
            "UPDATE senders SET sent_today = sent_today + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(count)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
