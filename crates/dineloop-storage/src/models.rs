//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use dineloop_common::types::{
    AudienceCriterion, CampaignId, ClientId, DispatchRecordId, PrizeOptionId, PrizeWheelId,
    RewardDefinitionId, RewardId, RewardKind, SenderId, TenantId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Processing,
    Paused,
    Sent,
    Failed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Processing => write!(f, "processing"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Sent => write!(f, "sent"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "processing" => Ok(CampaignStatus::Processing),
            "paused" => Ok(CampaignStatus::Paused),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Message body with `{{token}}` placeholders
    pub message_template: String,
    pub reward_kind: String,
    pub reward_definition_id: Option<RewardDefinitionId>,
    pub prize_wheel_id: Option<PrizeWheelId>,
    /// Tagged `AudienceCriterion` value
    pub audience: serde_json::Value,
    /// Pause between consecutive sends; 0 disables throttling
    pub dispatch_delay_ms: i64,
    pub reward_valid_until: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub send_count: i32,
    pub failure_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Get reward kind enum
    pub fn reward_kind_enum(&self) -> Option<RewardKind> {
        self.reward_kind.parse().ok()
    }

    /// Get the audience criterion; unrecognized variants target nobody
    pub fn audience_criterion(&self) -> AudienceCriterion {
        serde_json::from_value(self.audience.clone()).unwrap_or(AudienceCriterion::Unknown)
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub tenant_id: TenantId,
    pub name: String,
    pub message_template: String,
    pub reward_kind: RewardKind,
    pub reward_definition_id: Option<RewardDefinitionId>,
    pub prize_wheel_id: Option<PrizeWheelId>,
    pub audience: AudienceCriterion,
    pub dispatch_delay_ms: Option<i64>,
    pub reward_valid_until: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Client status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Archived,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Client model (a restaurant guest)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub tenant_id: TenantId,
    pub name: Option<String>,
    /// Contact address; clients without one are skipped during dispatch
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reward definition model (a redeemable reward type, e.g. a discount)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RewardDefinition {
    pub id: RewardDefinitionId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub details: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Prize wheel model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrizeWheel {
    pub id: PrizeWheelId,
    pub tenant_id: TenantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Prize option model - one weighted slot of a prize wheel
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrizeOption {
    pub id: PrizeOptionId,
    pub prize_wheel_id: PrizeWheelId,
    pub reward_definition_id: RewardDefinitionId,
    pub label: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Issued reward status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Active,
    Used,
    Expired,
}

impl std::fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardStatus::Active => write!(f, "active"),
            RewardStatus::Used => write!(f, "used"),
            RewardStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for RewardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RewardStatus::Active),
            "used" => Ok(RewardStatus::Used),
            "expired" => Ok(RewardStatus::Expired),
            _ => Err(format!("Invalid reward status: {}", s)),
        }
    }
}

/// Issued reward model (a coupon or a prize-draw result)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IssuedReward {
    pub id: RewardId,
    pub tenant_id: TenantId,
    /// Absent for rewards issued outside campaigns
    pub campaign_id: Option<CampaignId>,
    pub client_id: ClientId,
    pub reward_definition_id: RewardDefinitionId,
    /// Set when the reward came out of a prize wheel draw
    pub prize_option_id: Option<PrizeOptionId>,
    pub display_name: String,
    /// Redemption code, unique within the tenant
    pub code: String,
    pub status: String,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl IssuedReward {
    /// Get status enum
    pub fn status_enum(&self) -> Option<RewardStatus> {
        self.status.parse().ok()
    }
}

/// Create issued reward input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssuedReward {
    pub tenant_id: TenantId,
    pub campaign_id: Option<CampaignId>,
    pub client_id: ClientId,
    pub reward_definition_id: RewardDefinitionId,
    pub prize_option_id: Option<PrizeOptionId>,
    pub display_name: String,
    pub code: String,
    pub valid_until: DateTime<Utc>,
}

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Sent => write!(f, "sent"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Dispatch record model - one row per (campaign, client) send attempt
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: DispatchRecordId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub client_id: ClientId,
    pub address: String,
    pub outcome: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create dispatch record input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDispatchRecord {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub client_id: ClientId,
    pub address: String,
    pub outcome: DeliveryOutcome,
    pub error: Option<String>,
}

/// Per-campaign dispatch counts
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchCounts {
    pub sent: i64,
    pub failed: i64,
}

/// Sender resource model - a provisioned outbound sending identity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sender {
    pub id: SenderId,
    pub tenant_id: TenantId,
    pub address: String,
    pub daily_quota: i32,
    pub sent_today: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sender {
    /// Whether this sender can still deliver under its quota
    pub fn is_available(&self) -> bool {
        self.active && self.sent_today < self.daily_quota
    }
}

/// Campaign statistics assembled for the dashboard layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub status: String,
    pub sent: i64,
    pub failed: i64,
    pub rewards_issued: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn campaign_with(audience: serde_json::Value) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Spring promo".to_string(),
            message_template: "Hi {{first_name}}".to_string(),
            reward_kind: "none".to_string(),
            reward_definition_id: None,
            prize_wheel_id: None,
            audience,
            dispatch_delay_ms: 0,
            reward_valid_until: None,
            scheduled_at: None,
            status: "draft".to_string(),
            send_count: 0,
            failure_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_campaign_status_roundtrip() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Processing,
            CampaignStatus::Paused,
            CampaignStatus::Sent,
            CampaignStatus::Failed,
        ] {
            assert_eq!(
                status.to_string().parse::<CampaignStatus>().unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_audience_criterion_accessor() {
        let campaign = campaign_with(serde_json::json!({ "type": "all" }));
        assert_eq!(campaign.audience_criterion(), AudienceCriterion::All);

        let campaign = campaign_with(serde_json::json!({ "type": "sms_optin" }));
        assert_eq!(campaign.audience_criterion(), AudienceCriterion::Unknown);
    }

    #[test]
    fn test_sender_availability() {
        let mut sender = Sender {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            address: "promo@resto.example".to_string(),
            daily_quota: 100,
            sent_today: 99,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(sender.is_available());

        sender.sent_today = 100;
        assert!(!sender.is_available());

        sender.sent_today = 0;
        sender.active = false;
        assert!(!sender.is_available());
    }
}
