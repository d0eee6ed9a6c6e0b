//! In-memory repositories
//!
//! Mutex-guarded implementations of the repository traits, used by the
//! engine test suites and by local development without a database. Status
//! transitions are compare-and-set under the lock, matching the conditional
//! UPDATE the PostgreSQL backend performs.

use crate::models::{
    Campaign, CampaignStatus, Client, CreateCampaign, CreateDispatchRecord, CreateIssuedReward,
    DispatchCounts, DispatchRecord, IssuedReward, PrizeOption, PrizeWheel, RewardDefinition,
    Sender,
};
use crate::repository::{
    CampaignRepository, ClientRepository, DispatchRecordRepository, PrizeWheelRepository,
    RewardDefinitionRepository, RewardRepository, SenderRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use dineloop_common::types::{
    CampaignId, ClientId, PrizeWheelId, RewardDefinitionId, SenderId, TenantId,
};
use dineloop_common::{Error, Result};
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory campaign repository
#[derive(Default)]
pub struct MemoryCampaignRepository {
    campaigns: Mutex<Vec<Campaign>>,
}

#[async_trait]
impl CampaignRepository for MemoryCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            name: input.name,
            message_template: input.message_template,
            reward_kind: input.reward_kind.to_string(),
            reward_definition_id: input.reward_definition_id,
            prize_wheel_id: input.prize_wheel_id,
            audience: serde_json::to_value(&input.audience)
                .map_err(|e| Error::Internal(format!("Failed to encode audience: {}", e)))?,
            dispatch_delay_ms: input.dispatch_delay_ms.unwrap_or(0),
            reward_valid_until: input.reward_valid_until,
            scheduled_at: input.scheduled_at,
            status: CampaignStatus::Draft.to_string(),
            send_count: 0,
            failure_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };

        self.campaigns.lock().await.push(campaign.clone());
        Ok(campaign)
    }

    async fn get(&self, tenant_id: TenantId, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .campaigns
            .lock()
            .await
            .iter()
            .find(|c| c.id == id && c.tenant_id == tenant_id)
            .cloned())
    }

    async fn find(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .campaigns
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        Ok(self
            .campaigns
            .lock()
            .await
            .iter()
            .filter(|c| c.status == status.to_string())
            .cloned()
            .collect())
    }

    async fn try_transition(
        &self,
        id: CampaignId,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Option<Campaign>> {
        let mut campaigns = self.campaigns.lock().await;
        let Some(campaign) = campaigns.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        if !from.iter().any(|s| s.to_string() == campaign.status) {
            return Ok(None);
        }

        let now = Utc::now();
        campaign.status = to.to_string();
        campaign.updated_at = now;
        if to == CampaignStatus::Processing {
            campaign.started_at = Some(now);
        }
        if matches!(to, CampaignStatus::Sent | CampaignStatus::Failed) {
            campaign.completed_at = Some(now);
        }

        Ok(Some(campaign.clone()))
    }

    async fn set_scheduled_at(
        &self,
        id: CampaignId,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut campaigns = self.campaigns.lock().await;
        if let Some(campaign) = campaigns.iter_mut().find(|c| c.id == id) {
            campaign.scheduled_at = scheduled_at;
            campaign.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn add_run_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()> {
        let mut campaigns = self.campaigns.lock().await;
        if let Some(campaign) = campaigns.iter_mut().find(|c| c.id == id) {
            campaign.send_count += sent;
            campaign.failure_count += failed;
            campaign.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory client repository
#[derive(Default)]
pub struct MemoryClientRepository {
    clients: Mutex<Vec<Client>>,
}

impl MemoryClientRepository {
    /// Seed a client
    pub async fn insert(&self, client: Client) {
        self.clients.lock().await.push(client);
    }
}

#[async_trait]
impl ClientRepository for MemoryClientRepository {
    async fn get(&self, tenant_id: TenantId, id: ClientId) -> Result<Option<Client>> {
        Ok(self
            .clients
            .lock()
            .await
            .iter()
            .find(|c| c.id == id && c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_active(&self, tenant_id: TenantId) -> Result<Vec<Client>> {
        Ok(self
            .clients
            .lock()
            .await
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.status == "active")
            .cloned()
            .collect())
    }

    async fn list_by_birth_month(&self, tenant_id: TenantId, month: u32) -> Result<Vec<Client>> {
        Ok(self
            .clients
            .lock()
            .await
            .iter()
            .filter(|c| {
                c.tenant_id == tenant_id
                    && c.status == "active"
                    && c.birth_date.map(|d| d.month()) == Some(month)
            })
            .cloned()
            .collect())
    }

    async fn list_by_ids(&self, tenant_id: TenantId, ids: &[ClientId]) -> Result<Vec<Client>> {
        Ok(self
            .clients
            .lock()
            .await
            .iter()
            .filter(|c| {
                c.tenant_id == tenant_id && c.status == "active" && ids.contains(&c.id)
            })
            .cloned()
            .collect())
    }
}

/// In-memory issued reward repository
#[derive(Default)]
pub struct MemoryRewardRepository {
    rewards: Mutex<Vec<IssuedReward>>,
}

impl MemoryRewardRepository {
    fn build(input: CreateIssuedReward) -> IssuedReward {
        IssuedReward {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            campaign_id: input.campaign_id,
            client_id: input.client_id,
            reward_definition_id: input.reward_definition_id,
            prize_option_id: input.prize_option_id,
            display_name: input.display_name,
            code: input.code,
            status: "active".to_string(),
            issued_at: Utc::now(),
            valid_until: input.valid_until,
            used_at: None,
        }
    }
}

#[async_trait]
impl RewardRepository for MemoryRewardRepository {
    async fn create(&self, input: CreateIssuedReward) -> Result<IssuedReward> {
        let mut rewards = self.rewards.lock().await;
        if rewards
            .iter()
            .any(|r| r.tenant_id == input.tenant_id && r.code == input.code)
        {
            return Err(Error::Database(format!(
                "duplicate redemption code {}",
                input.code
            )));
        }
        let reward = Self::build(input);
        rewards.push(reward.clone());
        Ok(reward)
    }

    async fn create_batch(&self, inputs: Vec<CreateIssuedReward>) -> Result<Vec<IssuedReward>> {
        let mut rewards = self.rewards.lock().await;

        // validate the whole batch before inserting any row
        let mut batch_codes = HashSet::new();
        for input in &inputs {
            let collides = rewards
                .iter()
                .any(|r| r.tenant_id == input.tenant_id && r.code == input.code)
                || !batch_codes.insert((input.tenant_id, input.code.clone()));
            if collides {
                return Err(Error::Database(format!(
                    "duplicate redemption code {}",
                    input.code
                )));
            }
        }

        let created: Vec<IssuedReward> = inputs.into_iter().map(Self::build).collect();
        rewards.extend(created.iter().cloned());
        Ok(created)
    }

    async fn code_exists(&self, tenant_id: TenantId, code: &str) -> Result<bool> {
        Ok(self
            .rewards
            .lock()
            .await
            .iter()
            .any(|r| r.tenant_id == tenant_id && r.code == code))
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<IssuedReward>> {
        Ok(self
            .rewards
            .lock()
            .await
            .iter()
            .filter(|r| r.campaign_id == Some(campaign_id))
            .cloned()
            .collect())
    }
}

/// In-memory reward definition repository
#[derive(Default)]
pub struct MemoryRewardDefinitionRepository {
    definitions: Mutex<Vec<RewardDefinition>>,
}

impl MemoryRewardDefinitionRepository {
    /// Seed a reward definition
    pub async fn insert(&self, definition: RewardDefinition) {
        self.definitions.lock().await.push(definition);
    }
}

#[async_trait]
impl RewardDefinitionRepository for MemoryRewardDefinitionRepository {
    async fn get(
        &self,
        tenant_id: TenantId,
        id: RewardDefinitionId,
    ) -> Result<Option<RewardDefinition>> {
        Ok(self
            .definitions
            .lock()
            .await
            .iter()
            .find(|d| d.id == id && d.tenant_id == tenant_id)
            .cloned())
    }
}

/// In-memory prize wheel repository
#[derive(Default)]
pub struct MemoryPrizeWheelRepository {
    wheels: Mutex<Vec<PrizeWheel>>,
    options: Mutex<Vec<PrizeOption>>,
}

impl MemoryPrizeWheelRepository {
    /// Seed a wheel
    pub async fn insert_wheel(&self, wheel: PrizeWheel) {
        self.wheels.lock().await.push(wheel);
    }

    /// Seed a wheel option
    pub async fn insert_option(&self, option: PrizeOption) {
        self.options.lock().await.push(option);
    }
}

#[async_trait]
impl PrizeWheelRepository for MemoryPrizeWheelRepository {
    async fn get(&self, tenant_id: TenantId, id: PrizeWheelId) -> Result<Option<PrizeWheel>> {
        Ok(self
            .wheels
            .lock()
            .await
            .iter()
            .find(|w| w.id == id && w.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_options(&self, wheel_id: PrizeWheelId) -> Result<Vec<PrizeOption>> {
        Ok(self
            .options
            .lock()
            .await
            .iter()
            .filter(|o| o.prize_wheel_id == wheel_id)
            .cloned()
            .collect())
    }
}

/// In-memory dispatch record repository
#[derive(Default)]
pub struct MemoryDispatchRecordRepository {
    records: Mutex<Vec<DispatchRecord>>,
}

#[async_trait]
impl DispatchRecordRepository for MemoryDispatchRecordRepository {
    async fn record(&self, input: CreateDispatchRecord) -> Result<DispatchRecord> {
        let record = DispatchRecord {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            campaign_id: input.campaign_id,
            client_id: input.client_id,
            address: input.address,
            outcome: input.outcome.to_string(),
            error: input.error,
            created_at: Utc::now(),
        };
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn sent_client_ids(&self, campaign_id: CampaignId) -> Result<HashSet<ClientId>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.campaign_id == campaign_id && r.outcome == "sent")
            .map(|r| r.client_id)
            .collect())
    }

    async fn counts_by_campaign(&self, campaign_id: CampaignId) -> Result<DispatchCounts> {
        let records = self.records.lock().await;
        let mut counts = DispatchCounts::default();
        for record in records.iter().filter(|r| r.campaign_id == campaign_id) {
            match record.outcome.as_str() {
                "sent" => counts.sent += 1,
                "failed" => counts.failed += 1,
                _ => {}
            }
        }
        Ok(counts)
    }
}

/// In-memory sender repository
#[derive(Default)]
pub struct MemorySenderRepository {
    senders: Mutex<Vec<Sender>>,
}

impl MemorySenderRepository {
    /// Seed a sender
    pub async fn insert(&self, sender: Sender) {
        self.senders.lock().await.push(sender);
    }
}

#[async_trait]
impl SenderRepository for MemorySenderRepository {
    async fn find_available(&self) -> Result<Option<Sender>> {
        Ok(self
            .senders
            .lock()
            .await
            .iter()
            .find(|s| s.is_available())
            .cloned())
    }

    async fn add_sent(&self, id: SenderId, count: i32) -> Result<()> {
        let mut senders = self.senders.lock().await;
        if let Some(sender) = senders.iter_mut().find(|s| s.id == id) {
            sender.sent_today += count;
            sender.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dineloop_common::types::{AudienceCriterion, RewardKind};
    use pretty_assertions::assert_eq;

    fn draft_campaign(tenant_id: TenantId) -> CreateCampaign {
        CreateCampaign {
            tenant_id,
            name: "Weekend special".to_string(),
            message_template: "Hi {{first_name}}".to_string(),
            reward_kind: RewardKind::None,
            reward_definition_id: None,
            prize_wheel_id: None,
            audience: AudienceCriterion::All,
            dispatch_delay_ms: None,
            reward_valid_until: None,
            scheduled_at: None,
        }
    }

    fn reward_input(tenant_id: TenantId, code: &str) -> CreateIssuedReward {
        CreateIssuedReward {
            tenant_id,
            campaign_id: None,
            client_id: Uuid::new_v4(),
            reward_definition_id: Uuid::new_v4(),
            prize_option_id: None,
            display_name: "Free dessert".to_string(),
            code: code.to_string(),
            valid_until: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let repo = MemoryCampaignRepository::default();
        let campaign = repo.create(draft_campaign(Uuid::new_v4())).await.unwrap();

        let moved = repo
            .try_transition(
                campaign.id,
                &[CampaignStatus::Draft],
                CampaignStatus::Processing,
            )
            .await
            .unwrap();
        assert_eq!(
            moved.unwrap().status_enum(),
            Some(CampaignStatus::Processing)
        );

        // a second identical transition finds no draft row to claim
        let second = repo
            .try_transition(
                campaign.id,
                &[CampaignStatus::Draft],
                CampaignStatus::Processing,
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_batch_with_duplicate_code_inserts_nothing() {
        let repo = MemoryRewardRepository::default();
        let tenant_id = Uuid::new_v4();

        let result = repo
            .create_batch(vec![
                reward_input(tenant_id, "AAAA1111"),
                reward_input(tenant_id, "BBBB2222"),
                reward_input(tenant_id, "AAAA1111"),
            ])
            .await;

        assert!(result.is_err());
        assert!(!repo.code_exists(tenant_id, "BBBB2222").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_code_allowed_across_tenants() {
        let repo = MemoryRewardRepository::default();

        repo.create(reward_input(Uuid::new_v4(), "SHARED99"))
            .await
            .unwrap();
        repo.create(reward_input(Uuid::new_v4(), "SHARED99"))
            .await
            .unwrap();
    }
}
