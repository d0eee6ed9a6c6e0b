//! Repository layer for data access

pub mod campaigns;
pub mod clients;
pub mod dispatch_records;
pub mod memory;
pub mod prize_wheels;
pub mod rewards;
pub mod senders;

// Repository traits
pub use campaigns::CampaignRepository;
pub use clients::ClientRepository;
pub use dispatch_records::DispatchRecordRepository;
pub use prize_wheels::PrizeWheelRepository;
pub use rewards::{RewardDefinitionRepository, RewardRepository};
pub use senders::SenderRepository;

// PostgreSQL implementations
pub use campaigns::DbCampaignRepository;
pub use clients::DbClientRepository;
pub use dispatch_records::DbDispatchRecordRepository;
pub use prize_wheels::DbPrizeWheelRepository;
pub use rewards::{DbRewardDefinitionRepository, DbRewardRepository};
pub use senders::DbSenderRepository;

// In-memory implementations for tests and local development
pub use memory::{
    MemoryCampaignRepository, MemoryClientRepository, MemoryDispatchRecordRepository,
    MemoryPrizeWheelRepository, MemoryRewardDefinitionRepository, MemoryRewardRepository,
    MemorySenderRepository,
};
