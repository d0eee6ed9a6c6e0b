//! Client repository

use crate::db::DatabasePool;
use crate::models::Client;
use async_trait::async_trait;
use dineloop_common::types::{ClientId, TenantId};
use dineloop_common::{Error, Result};

/// Client repository trait
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: ClientId) -> Result<Option<Client>>;
    async fn list_active(&self, tenant_id: TenantId) -> Result<Vec<Client>>;
    /// Active clients whose birthday falls in `month` (1-12)
    async fn list_by_birth_month(&self, tenant_id: TenantId, month: u32) -> Result<Vec<Client>>;
    /// Clients restricted to the given id set, still tenant-scoped
    async fn list_by_ids(&self, tenant_id: TenantId, ids: &[ClientId]) -> Result<Vec<Client>>;
}

/// Database client repository
pub struct DbClientRepository {
    pool: DatabasePool,
}

impl DbClientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for DbClientRepository {
    async fn get(&self, tenant_id: TenantId, id: ClientId) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_active(&self, tenant_id: TenantId) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE tenant_id = $1 AND status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_birth_month(&self, tenant_id: TenantId, month: u32) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE tenant_id = $1
              AND status = 'active'
              AND birth_date IS NOT NULL
              AND EXTRACT(MONTH FROM birth_date) = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(month as i32)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_ids(&self, tenant_id: TenantId, ids: &[ClientId]) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE tenant_id = $1 AND status = 'active' AND id = ANY($2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
