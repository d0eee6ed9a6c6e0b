//! Common types for DineLoop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tenants (restaurants / restaurant groups)
pub type TenantId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for clients
pub type ClientId = Uuid;

/// Unique identifier for reward definitions
pub type RewardDefinitionId = Uuid;

/// Unique identifier for prize wheels
pub type PrizeWheelId = Uuid;

/// Unique identifier for prize options
pub type PrizeOptionId = Uuid;

/// Unique identifier for issued rewards
pub type RewardId = Uuid;

/// Unique identifier for dispatch records
pub type DispatchRecordId = Uuid;

/// Unique identifier for sender resources
pub type SenderId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Which reward, if any, a campaign grants to each recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    None,
    DirectReward,
    PrizeWheel,
}

impl std::fmt::Display for RewardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardKind::None => write!(f, "none"),
            RewardKind::DirectReward => write!(f, "direct_reward"),
            RewardKind::PrizeWheel => write!(f, "prize_wheel"),
        }
    }
}

impl std::str::FromStr for RewardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RewardKind::None),
            "direct_reward" => Ok(RewardKind::DirectReward),
            "prize_wheel" => Ok(RewardKind::PrizeWheel),
            _ => Err(format!("Invalid reward kind: {}", s)),
        }
    }
}

/// Audience targeting criterion for a campaign
///
/// Stored as JSON on the campaign row. Criterion variants added by newer
/// writers deserialize as `Unknown`, which targets nobody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudienceCriterion {
    /// Every active client of the tenant
    All,
    /// Clients whose birthday falls in the given month (current month when absent)
    BirthdayMonth { month: Option<u32> },
    /// An explicit client id list, still tenant-scoped
    ClientIds { ids: Vec<ClientId> },
    #[serde(other)]
    Unknown,
}

/// Contact address for outbound messages
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactAddress {
    pub local: String,
    pub domain: String,
}

impl ContactAddress {
    /// Create a new contact address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse a contact address from a string
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.splitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Self::new(parts[0], parts[1]))
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for ContactAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| crate::Error::Validation("Invalid contact address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_address_parse() {
        let addr = ContactAddress::parse("guest@example.com").unwrap();
        assert_eq!(addr.local, "guest");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.to_string(), "guest@example.com");
    }

    #[test]
    fn test_contact_address_invalid() {
        assert!(ContactAddress::parse("invalid").is_none());
        assert!(ContactAddress::parse("@example.com").is_none());
        assert!(ContactAddress::parse("guest@").is_none());
    }

    #[test]
    fn test_reward_kind_roundtrip() {
        for kind in [
            RewardKind::None,
            RewardKind::DirectReward,
            RewardKind::PrizeWheel,
        ] {
            assert_eq!(kind.to_string().parse::<RewardKind>().unwrap(), kind);
        }
        assert!("coupon".parse::<RewardKind>().is_err());
    }

    #[test]
    fn test_criterion_json_roundtrip() {
        let criterion = AudienceCriterion::BirthdayMonth { month: Some(4) };
        let json = serde_json::to_value(&criterion).unwrap();
        assert_eq!(json["type"], "birthday_month");
        let back: AudienceCriterion = serde_json::from_value(json).unwrap();
        assert_eq!(back, criterion);
    }

    #[test]
    fn test_unknown_criterion_is_forward_compatible() {
        let json = serde_json::json!({ "type": "visited_since", "days": 30 });
        let criterion: AudienceCriterion = serde_json::from_value(json).unwrap();
        assert_eq!(criterion, AudienceCriterion::Unknown);
    }
}
