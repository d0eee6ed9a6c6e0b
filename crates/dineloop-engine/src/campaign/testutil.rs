//! Shared fixtures for the campaign engine test suites

use super::manager::{CampaignManager, EngineRepositories};
use super::prize::{OsRandomSource, RandomSource};
use super::scheduler::CampaignScheduler;
use crate::transport::MessageTransport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dineloop_common::config::EngineConfig;
use dineloop_common::types::{AudienceCriterion, RewardKind, TenantId};
use dineloop_common::{Error, Result};
use dineloop_storage::models::{
    Campaign, Client, CreateCampaign, PrizeOption, PrizeWheel, RewardDefinition, Sender,
};
use dineloop_storage::repository::{
    CampaignRepository, MemoryCampaignRepository, MemoryClientRepository,
    MemoryDispatchRecordRepository, MemoryPrizeWheelRepository, MemoryRewardDefinitionRepository,
    MemoryRewardRepository, MemorySenderRepository,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Random source pinned to one value
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn unit(&self) -> f64 {
        self.0
    }
}

/// Transport double recording every delivery
pub struct FakeTransport {
    sent: Mutex<Vec<(TenantId, String, String)>>,
    failing: Mutex<HashSet<String>>,
    stalling: Mutex<HashSet<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            stalling: Mutex::new(HashSet::new()),
        }
    }

    /// Make sends to `address` fail
    pub async fn fail_for(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    /// Make sends to `address` hang forever
    pub async fn stall_for(&self, address: &str) {
        self.stalling.lock().await.insert(address.to_string());
    }

    pub async fn sent_addresses(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, to, _)| to.clone()).collect()
    }

    pub async fn sent_bodies(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, _, body)| body.clone()).collect()
    }
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn send(&self, tenant_id: TenantId, to: &str, body: &str) -> Result<()> {
        if self.stalling.lock().await.contains(to) {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().await.contains(to) {
            return Err(Error::Transport(format!("Provider rejected {}", to)));
        }
        self.sent
            .lock()
            .await
            .push((tenant_id, to.to_string(), body.to_string()));
        Ok(())
    }
}

/// Active client with the given contact address
pub fn client_with_email(tenant_id: TenantId, email: Option<&str>) -> Client {
    Client {
        id: Uuid::new_v4(),
        tenant_id,
        name: Some("Sam Porter".to_string()),
        email: email.map(String::from),
        birth_date: None,
        status: "active".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Everything a lifecycle test needs, wired over the in-memory backend
pub struct TestHarness {
    pub tenant_id: TenantId,
    pub campaigns: Arc<MemoryCampaignRepository>,
    pub clients: Arc<MemoryClientRepository>,
    pub definitions: Arc<MemoryRewardDefinitionRepository>,
    pub wheels: Arc<MemoryPrizeWheelRepository>,
    pub rewards: Arc<MemoryRewardRepository>,
    pub dispatch_records: Arc<MemoryDispatchRecordRepository>,
    pub senders: Arc<MemorySenderRepository>,
    pub transport: Arc<FakeTransport>,
    pub scheduler: Arc<CampaignScheduler>,
    pub manager: Arc<CampaignManager>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_random(Arc::new(OsRandomSource))
    }

    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        let campaigns = Arc::new(MemoryCampaignRepository::default());
        let clients = Arc::new(MemoryClientRepository::default());
        let definitions = Arc::new(MemoryRewardDefinitionRepository::default());
        let wheels = Arc::new(MemoryPrizeWheelRepository::default());
        let rewards = Arc::new(MemoryRewardRepository::default());
        let dispatch_records = Arc::new(MemoryDispatchRecordRepository::default());
        let senders = Arc::new(MemorySenderRepository::default());
        let transport = Arc::new(FakeTransport::new());
        let scheduler = Arc::new(CampaignScheduler::new());

        let repos = EngineRepositories {
            campaigns: campaigns.clone(),
            clients: clients.clone(),
            reward_definitions: definitions.clone(),
            prize_wheels: wheels.clone(),
            rewards: rewards.clone(),
            dispatch_records: dispatch_records.clone(),
            senders: senders.clone(),
        };

        let manager = Arc::new(
            CampaignManager::new(
                repos,
                transport.clone(),
                scheduler.clone(),
                &EngineConfig::default(),
            )
            .with_random_source(random),
        );

        Self {
            tenant_id: Uuid::new_v4(),
            campaigns,
            clients,
            definitions,
            wheels,
            rewards,
            dispatch_records,
            senders,
            transport,
            scheduler,
            manager,
        }
    }

    pub fn campaign_input(&self) -> CreateCampaign {
        CreateCampaign {
            tenant_id: self.tenant_id,
            name: "Weekday lunch push".to_string(),
            message_template: "Hi {{first_name}}, code {{reward_code}}".to_string(),
            reward_kind: RewardKind::None,
            reward_definition_id: None,
            prize_wheel_id: None,
            audience: AudienceCriterion::All,
            dispatch_delay_ms: None,
            reward_valid_until: None,
            scheduled_at: None,
        }
    }

    pub async fn create_campaign(&self, input: CreateCampaign) -> Campaign {
        self.campaigns.create(input).await.unwrap()
    }

    pub async fn seed_client(&self, email: Option<&str>) -> Client {
        let client = client_with_email(self.tenant_id, email);
        self.clients.insert(client.clone()).await;
        client
    }

    pub async fn seed_sender(&self, daily_quota: i32, sent_today: i32) -> Sender {
        let sender = Sender {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            address: "promo@resto.example".to_string(),
            daily_quota,
            sent_today,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.senders.insert(sender.clone()).await;
        sender
    }

    pub async fn seed_definition(&self, name: &str) -> RewardDefinition {
        let definition = RewardDefinition {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: name.to_string(),
            description: None,
            details: serde_json::json!({}),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.definitions.insert(definition.clone()).await;
        definition
    }

    /// Wheel with one option per (label, weight), all granting `definition`
    pub async fn seed_wheel(
        &self,
        definition: &RewardDefinition,
        options: &[(&str, f64)],
    ) -> PrizeWheel {
        let wheel = PrizeWheel {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            name: "House wheel".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.wheels.insert_wheel(wheel.clone()).await;

        for (label, weight) in options {
            self.wheels
                .insert_option(PrizeOption {
                    id: Uuid::new_v4(),
                    prize_wheel_id: wheel.id,
                    reward_definition_id: definition.id,
                    label: label.to_string(),
                    weight: *weight,
                    created_at: Utc::now(),
                })
                .await;
        }

        wheel
    }

    pub async fn campaign_status(&self, campaign: &Campaign) -> String {
        self.campaigns
            .find(campaign.id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn schedule_at(&self, input: CreateCampaign, at: DateTime<Utc>) -> Campaign {
        let mut input = input;
        input.scheduled_at = Some(at);
        self.create_campaign(input).await
    }
}
