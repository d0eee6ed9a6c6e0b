//! Audience Selector - resolves a targeting criterion into concrete clients

use chrono::{Datelike, Utc};
use dineloop_common::types::{AudienceCriterion, TenantId};
use dineloop_common::{Error, Result};
use dineloop_storage::models::Client;
use dineloop_storage::repository::ClientRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Resolves campaign audiences, always scoped to one tenant
pub struct AudienceSelector {
    clients: Arc<dyn ClientRepository>,
}

impl AudienceSelector {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    /// Resolve `criterion` to a deduplicated client list.
    ///
    /// Criterion variants this build does not recognize select nobody; a
    /// malformed month is a configuration error.
    pub async fn select(
        &self,
        tenant_id: TenantId,
        criterion: &AudienceCriterion,
    ) -> Result<Vec<Client>> {
        let clients = match criterion {
            AudienceCriterion::All => self.clients.list_active(tenant_id).await?,
            AudienceCriterion::BirthdayMonth { month } => {
                let month = month.unwrap_or_else(|| Utc::now().month());
                if !(1..=12).contains(&month) {
                    return Err(Error::Validation(format!(
                        "Invalid birthday month: {}",
                        month
                    )));
                }
                self.clients.list_by_birth_month(tenant_id, month).await?
            }
            AudienceCriterion::ClientIds { ids } => {
                self.clients.list_by_ids(tenant_id, ids).await?
            }
            AudienceCriterion::Unknown => {
                warn!(%tenant_id, "Unrecognized audience criterion, selecting nobody");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        Ok(clients
            .into_iter()
            .filter(|client| seen.insert(client.id))
            .collect())
    }
}
