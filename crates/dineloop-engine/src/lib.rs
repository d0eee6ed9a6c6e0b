//! DineLoop Engine - Campaign orchestration and reward distribution
//!
//! This crate carries a configured marketing campaign through its lifecycle:
//! audience selection, reward issuance (coupons and weighted prize draws),
//! message personalization, throttled dispatch, deferred scheduling and
//! automatic resumption after sender starvation. It is library-shaped: the
//! surrounding application layer triggers it and owns all wire surfaces.

pub mod campaign;
pub mod transport;

pub use campaign::{
    AudienceSelector, AvailabilityMonitor, CampaignError, CampaignManager, CampaignScheduler,
    DispatchOutcome, EngineRepositories, OsRandomSource, PrizeSelector, RandomSource,
    RewardContext, RewardIssuer, RunOutcome, SweepReport, TemplateRenderer, ThrottledDispatcher,
};
pub use transport::{MessageTransport, SmtpTransport};
