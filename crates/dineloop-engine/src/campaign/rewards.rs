//! Reward Ledger - coupon and prize-token issuance

use chrono::{DateTime, Duration, Utc};
use dineloop_common::types::{ClientId, TenantId};
use dineloop_common::{Error, Result};
use dineloop_storage::models::{
    Campaign, Client, CreateIssuedReward, IssuedReward, PrizeOption, RewardDefinition,
};
use dineloop_storage::repository::RewardRepository;
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Redemption code alphabet; ambiguous glyphs excluded
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 10;
const MAX_CODE_ATTEMPTS: usize = 8;

/// Issues rewards and their redemption codes
pub struct RewardIssuer {
    rewards: Arc<dyn RewardRepository>,
    default_validity_days: i64,
}

impl RewardIssuer {
    pub fn new(rewards: Arc<dyn RewardRepository>, default_validity_days: i64) -> Self {
        Self {
            rewards,
            default_validity_days,
        }
    }

    /// Issue one direct reward per client in a single all-or-nothing batch
    pub async fn issue_direct_batch(
        &self,
        campaign: &Campaign,
        definition: &RewardDefinition,
        clients: &[Client],
    ) -> Result<Vec<IssuedReward>> {
        let valid_until = self.validity_for(campaign);
        let mut batch_codes = HashSet::new();
        let mut inputs = Vec::with_capacity(clients.len());

        for client in clients {
            let code = self.unique_code(campaign.tenant_id, &mut batch_codes).await?;
            inputs.push(CreateIssuedReward {
                tenant_id: campaign.tenant_id,
                campaign_id: Some(campaign.id),
                client_id: client.id,
                reward_definition_id: definition.id,
                prize_option_id: None,
                display_name: definition.name.clone(),
                code,
                valid_until,
            });
        }

        self.rewards.create_batch(inputs).await
    }

    /// Issue prize-draw results, one per (client, drawn option) pair, in a
    /// single all-or-nothing batch
    pub async fn issue_prize_batch(
        &self,
        campaign: &Campaign,
        picks: &[(ClientId, PrizeOption)],
    ) -> Result<Vec<IssuedReward>> {
        let valid_until = self.validity_for(campaign);
        let mut batch_codes = HashSet::new();
        let mut inputs = Vec::with_capacity(picks.len());

        for (client_id, option) in picks {
            let code = self.unique_code(campaign.tenant_id, &mut batch_codes).await?;
            inputs.push(CreateIssuedReward {
                tenant_id: campaign.tenant_id,
                campaign_id: Some(campaign.id),
                client_id: *client_id,
                reward_definition_id: option.reward_definition_id,
                prize_option_id: Some(option.id),
                display_name: option.label.clone(),
                code,
                valid_until,
            });
        }

        self.rewards.create_batch(inputs).await
    }

    /// Issue a single reward outside any campaign
    pub async fn issue_single(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
        definition: &RewardDefinition,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<IssuedReward> {
        let mut batch_codes = HashSet::new();
        let code = self.unique_code(tenant_id, &mut batch_codes).await?;

        self.rewards
            .create(CreateIssuedReward {
                tenant_id,
                campaign_id: None,
                client_id,
                reward_definition_id: definition.id,
                prize_option_id: None,
                display_name: definition.name.clone(),
                code,
                valid_until: valid_until.unwrap_or_else(|| self.default_validity()),
            })
            .await
    }

    fn validity_for(&self, campaign: &Campaign) -> DateTime<Utc> {
        campaign
            .reward_valid_until
            .unwrap_or_else(|| self.default_validity())
    }

    fn default_validity(&self) -> DateTime<Utc> {
        Utc::now() + Duration::days(self.default_validity_days)
    }

    /// A code absent from the tenant ledger and from the batch in flight.
    /// The unique (tenant, code) index remains the backstop against issuance
    /// racing in another process.
    async fn unique_code(
        &self,
        tenant_id: TenantId,
        batch_codes: &mut HashSet<String>,
    ) -> Result<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code();
            if batch_codes.contains(&code) {
                continue;
            }
            if self.rewards.code_exists(tenant_id, &code).await? {
                continue;
            }
            batch_codes.insert(code.clone());
            return Ok(code);
        }

        Err(Error::Internal(
            "Exhausted redemption code attempts".to_string(),
        ))
    }
}

/// Random redemption code; never derived from client data
fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dineloop_common::types::{AudienceCriterion, RewardKind};
    use dineloop_storage::models::CreateCampaign;
    use dineloop_storage::repository::{CampaignRepository, MemoryCampaignRepository, MemoryRewardRepository};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn definition(tenant_id: TenantId) -> RewardDefinition {
        RewardDefinition {
            id: Uuid::new_v4(),
            tenant_id,
            name: "10% off".to_string(),
            description: None,
            details: serde_json::json!({}),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn client(tenant_id: TenantId) -> Client {
        Client {
            id: Uuid::new_v4(),
            tenant_id,
            name: None,
            email: Some("guest@example.com".to_string()),
            birth_date: None,
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn campaign(
        tenant_id: TenantId,
        reward_valid_until: Option<DateTime<Utc>>,
    ) -> Campaign {
        let repo = MemoryCampaignRepository::default();
        repo.create(CreateCampaign {
            tenant_id,
            name: "Loyalty push".to_string(),
            message_template: "{{reward_code}}".to_string(),
            reward_kind: RewardKind::DirectReward,
            reward_definition_id: None,
            prize_wheel_id: None,
            audience: AudienceCriterion::All,
            dispatch_delay_ms: None,
            reward_valid_until,
            scheduled_at: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_bulk_issuance_yields_distinct_codes() {
        let tenant_id = Uuid::new_v4();
        let issuer = RewardIssuer::new(Arc::new(MemoryRewardRepository::default()), 30);
        let definition = definition(tenant_id);
        let clients: Vec<Client> = (0..100).map(|_| client(tenant_id)).collect();
        let campaign = campaign(tenant_id, None).await;

        let issued = issuer
            .issue_direct_batch(&campaign, &definition, &clients)
            .await
            .unwrap();

        assert_eq!(issued.len(), 100);
        let codes: HashSet<&str> = issued.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes.len(), 100);
        for reward in &issued {
            assert_eq!(reward.code.len(), CODE_LENGTH);
            assert!(reward
                .code
                .bytes()
                .all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_expiry_defaults_to_thirty_days() {
        let tenant_id = Uuid::new_v4();
        let issuer = RewardIssuer::new(Arc::new(MemoryRewardRepository::default()), 30);
        let campaign = campaign(tenant_id, None).await;

        let issued = issuer
            .issue_direct_batch(&campaign, &definition(tenant_id), &[client(tenant_id)])
            .await
            .unwrap();

        let days = (issued[0].valid_until - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
    }

    #[tokio::test]
    async fn test_expiry_follows_campaign_window() {
        let tenant_id = Uuid::new_v4();
        let issuer = RewardIssuer::new(Arc::new(MemoryRewardRepository::default()), 30);
        let window_end = Utc::now() + Duration::days(7);
        let campaign = campaign(tenant_id, Some(window_end)).await;

        let issued = issuer
            .issue_direct_batch(&campaign, &definition(tenant_id), &[client(tenant_id)])
            .await
            .unwrap();

        assert_eq!(issued[0].valid_until, window_end);
    }

    #[tokio::test]
    async fn test_single_issuance_outside_campaigns() {
        let tenant_id = Uuid::new_v4();
        let issuer = RewardIssuer::new(Arc::new(MemoryRewardRepository::default()), 30);
        let guest = client(tenant_id);

        let issued = issuer
            .issue_single(tenant_id, guest.id, &definition(tenant_id), None)
            .await
            .unwrap();

        assert_eq!(issued.campaign_id, None);
        assert_eq!(issued.client_id, guest.id);
    }
}
