//! Campaign Manager - lifecycle state machine and run orchestration

use super::audience::AudienceSelector;
use super::dispatcher::{DispatchOutcome, ThrottledDispatcher};
use super::prize::{OsRandomSource, PrizeSelector, RandomSource};
use super::rewards::RewardIssuer;
use super::scheduler::CampaignScheduler;
use super::template::{RewardContext, TemplateRenderer};
use crate::transport::MessageTransport;
use chrono::Utc;
use dineloop_common::config::EngineConfig;
use dineloop_common::types::{CampaignId, ClientId, RewardKind, TenantId};
use dineloop_storage::models::{
    Campaign, CampaignStats, CampaignStatus, Client, PrizeOption, RewardDefinition,
};
use dineloop_storage::repository::{
    CampaignRepository, ClientRepository, DispatchRecordRepository, PrizeWheelRepository,
    RewardDefinitionRepository, RewardRepository, SenderRepository,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign is already {0}")]
    AlreadyHandled(String),

    #[error("Invalid reward configuration: {0}")]
    InvalidRewardConfig(String),

    #[error(transparent)]
    Common(#[from] dineloop_common::Error),
}

/// Statuses a trigger may claim a campaign from
const TRIGGERABLE: &[CampaignStatus] = &[
    CampaignStatus::Draft,
    CampaignStatus::Paused,
    CampaignStatus::Failed,
];

/// Repository handles the engine operates on
pub struct EngineRepositories {
    pub campaigns: Arc<dyn CampaignRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub reward_definitions: Arc<dyn RewardDefinitionRepository>,
    pub prize_wheels: Arc<dyn PrizeWheelRepository>,
    pub rewards: Arc<dyn RewardRepository>,
    pub dispatch_records: Arc<dyn DispatchRecordRepository>,
    pub senders: Arc<dyn SenderRepository>,
}

/// How a campaign run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Dispatch loop finished; individual failures may still be recorded
    Completed(DispatchOutcome),
    /// The audience resolved empty; nothing to do counts as success
    EmptyAudience,
    /// No sender capacity; the campaign waits for the availability monitor
    Starved,
}

enum RewardPlan {
    None,
    Direct(RewardDefinition),
    Wheel(Vec<PrizeOption>),
}

/// Owns the campaign state machine and coordinates every run
pub struct CampaignManager {
    campaigns: Arc<dyn CampaignRepository>,
    reward_definitions: Arc<dyn RewardDefinitionRepository>,
    prize_wheels: Arc<dyn PrizeWheelRepository>,
    issued_rewards: Arc<dyn RewardRepository>,
    dispatch_records: Arc<dyn DispatchRecordRepository>,
    senders: Arc<dyn SenderRepository>,
    audience: AudienceSelector,
    prizes: PrizeSelector,
    rewards: RewardIssuer,
    dispatcher: ThrottledDispatcher,
    renderer: TemplateRenderer,
    transport: Arc<dyn MessageTransport>,
    scheduler: Arc<CampaignScheduler>,
    send_timeout: Duration,
}

impl CampaignManager {
    /// Wire the manager from its collaborators, resolved once at startup
    pub fn new(
        repos: EngineRepositories,
        transport: Arc<dyn MessageTransport>,
        scheduler: Arc<CampaignScheduler>,
        config: &EngineConfig,
    ) -> Self {
        let send_timeout = Duration::from_secs(config.send_timeout_secs);
        let renderer = TemplateRenderer::new(config.claim_base_url.clone());

        Self {
            audience: AudienceSelector::new(repos.clients.clone()),
            prizes: PrizeSelector::new(Arc::new(OsRandomSource)),
            rewards: RewardIssuer::new(
                repos.rewards.clone(),
                config.default_reward_validity_days,
            ),
            dispatcher: ThrottledDispatcher::new(
                transport.clone(),
                renderer.clone(),
                repos.dispatch_records.clone(),
                send_timeout,
            ),
            renderer,
            campaigns: repos.campaigns,
            reward_definitions: repos.reward_definitions,
            prize_wheels: repos.prize_wheels,
            issued_rewards: repos.rewards,
            dispatch_records: repos.dispatch_records,
            senders: repos.senders,
            transport,
            scheduler,
            send_timeout,
        }
    }

    /// Replace the draw random source
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.prizes = PrizeSelector::new(random);
        self
    }

    /// Trigger a campaign now, or register it for its configured future
    /// start. A campaign that is already scheduled, processing or sent is
    /// rejected without touching its state; the status claim itself is one
    /// conditional update, so concurrent triggers cannot both win.
    pub async fn schedule_processing(
        self: &Arc<Self>,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaigns
            .get(tenant_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if matches!(
            campaign.status_enum(),
            Some(
                CampaignStatus::Scheduled
                    | CampaignStatus::Processing
                    | CampaignStatus::Sent
            )
        ) {
            return Err(CampaignError::AlreadyHandled(campaign.status));
        }

        match campaign.scheduled_at {
            Some(trigger_at) if trigger_at > Utc::now() => {
                let updated = self
                    .campaigns
                    .try_transition(campaign_id, TRIGGERABLE, CampaignStatus::Scheduled)
                    .await?
                    .ok_or_else(|| {
                        CampaignError::AlreadyHandled(
                            "claimed by a concurrent trigger".to_string(),
                        )
                    })?;

                let manager = Arc::clone(self);
                self.scheduler
                    .schedule(campaign_id, trigger_at, async move {
                        manager.run_scheduled(campaign_id).await;
                    })
                    .await;

                info!(%campaign_id, %trigger_at, "Campaign scheduled");
                Ok(updated)
            }
            _ => {
                let updated = self
                    .campaigns
                    .try_transition(campaign_id, TRIGGERABLE, CampaignStatus::Processing)
                    .await?
                    .ok_or_else(|| {
                        CampaignError::AlreadyHandled(
                            "claimed by a concurrent trigger".to_string(),
                        )
                    })?;

                let manager = Arc::clone(self);
                tokio::spawn(async move {
                    let _ = manager.execute(campaign_id).await;
                });

                info!(%campaign_id, "Campaign processing started");
                Ok(updated)
            }
        }
    }

    /// Cancel a deferred campaign before its trigger fires
    pub async fn cancel_scheduled(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaigns
            .get(tenant_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Scheduled) {
            return Err(CampaignError::AlreadyHandled(campaign.status));
        }

        self.scheduler.cancel(campaign_id).await;

        let updated = self
            .campaigns
            .try_transition(campaign_id, &[CampaignStatus::Scheduled], CampaignStatus::Draft)
            .await?
            .ok_or_else(|| {
                CampaignError::AlreadyHandled("claimed by a concurrent trigger".to_string())
            })?;

        info!(%campaign_id, "Scheduled campaign cancelled");
        Ok(updated)
    }

    /// Re-register deferred triggers after a process restart. Campaigns whose
    /// start time already passed are claimed and run immediately.
    pub async fn restore_scheduled(self: &Arc<Self>) -> Result<usize, CampaignError> {
        let scheduled = self
            .campaigns
            .list_by_status(CampaignStatus::Scheduled)
            .await?;
        let restored = scheduled.len();

        for campaign in scheduled {
            let campaign_id = campaign.id;
            let manager = Arc::clone(self);
            match campaign.scheduled_at {
                Some(trigger_at) if trigger_at > Utc::now() => {
                    self.scheduler
                        .schedule(campaign_id, trigger_at, async move {
                            manager.run_scheduled(campaign_id).await;
                        })
                        .await;
                }
                _ => {
                    tokio::spawn(async move {
                        manager.run_scheduled(campaign_id).await;
                    });
                }
            }
        }

        Ok(restored)
    }

    /// Scheduler callback: claim the scheduled campaign and run it
    async fn run_scheduled(&self, campaign_id: CampaignId) {
        match self
            .campaigns
            .try_transition(
                campaign_id,
                &[CampaignStatus::Scheduled],
                CampaignStatus::Processing,
            )
            .await
        {
            Ok(Some(_)) => {
                let _ = self.execute(campaign_id).await;
            }
            Ok(None) => {
                warn!(%campaign_id, "Trigger fired but campaign was no longer scheduled")
            }
            Err(e) => {
                error!(%campaign_id, error = %e, "Failed to claim scheduled campaign")
            }
        }
    }

    /// Run one campaign to a terminal or waiting state.
    ///
    /// Errors of the run itself (bad reward configuration, bulk issuance
    /// failure, repository faults) move the campaign to `failed`; individual
    /// delivery failures stay inside the dispatcher and never do.
    pub async fn execute(&self, campaign_id: CampaignId) -> Result<RunOutcome, CampaignError> {
        match self.run(campaign_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(%campaign_id, error = %e, "Campaign run failed");
                if let Err(persist_err) = self
                    .campaigns
                    .try_transition(
                        campaign_id,
                        &[CampaignStatus::Processing],
                        CampaignStatus::Failed,
                    )
                    .await
                {
                    error!(
                        %campaign_id,
                        error = %persist_err,
                        "Failed to record campaign failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(&self, campaign_id: CampaignId) -> Result<RunOutcome, CampaignError> {
        let campaign = self
            .campaigns
            .find(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let plan = self.reward_plan(&campaign).await?;

        let recipients = self
            .audience
            .select(campaign.tenant_id, &campaign.audience_criterion())
            .await?;

        if recipients.is_empty() {
            info!(campaign_id = %campaign.id, "Audience resolved empty, nothing to send");
            self.campaigns
                .try_transition(
                    campaign.id,
                    &[CampaignStatus::Processing],
                    CampaignStatus::Sent,
                )
                .await?;
            return Ok(RunOutcome::EmptyAudience);
        }

        let Some(sender) = self.senders.find_available().await? else {
            warn!(campaign_id = %campaign.id, "No sender capacity, pausing campaign");
            self.campaigns
                .try_transition(
                    campaign.id,
                    &[CampaignStatus::Processing],
                    CampaignStatus::Paused,
                )
                .await?;
            return Ok(RunOutcome::Starved);
        };

        let rewards_by_client = self.issue_rewards(&campaign, plan, &recipients).await?;

        let outcome = self
            .dispatcher
            .dispatch_all(&campaign, &recipients, &rewards_by_client)
            .await?;

        if let Err(e) = self.senders.add_sent(sender.id, outcome.sent as i32).await {
            warn!(campaign_id = %campaign.id, error = %e, "Failed to update sender usage");
        }
        if let Err(e) = self
            .campaigns
            .add_run_counts(campaign.id, outcome.sent as i32, outcome.failed as i32)
            .await
        {
            warn!(campaign_id = %campaign.id, error = %e, "Failed to update campaign counters");
        }

        self.campaigns
            .try_transition(
                campaign.id,
                &[CampaignStatus::Processing],
                CampaignStatus::Sent,
            )
            .await?;

        info!(
            campaign_id = %campaign.id,
            sent = outcome.sent,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "Campaign dispatched"
        );
        Ok(RunOutcome::Completed(outcome))
    }

    /// Check the reward invariants before anything else runs
    async fn reward_plan(&self, campaign: &Campaign) -> Result<RewardPlan, CampaignError> {
        match campaign.reward_kind_enum() {
            Some(RewardKind::None) => Ok(RewardPlan::None),
            Some(RewardKind::DirectReward) => {
                let definition_id = campaign.reward_definition_id.ok_or_else(|| {
                    CampaignError::InvalidRewardConfig(
                        "direct-reward campaign has no reward definition".to_string(),
                    )
                })?;
                let definition = self
                    .reward_definitions
                    .get(campaign.tenant_id, definition_id)
                    .await?
                    .ok_or_else(|| {
                        CampaignError::InvalidRewardConfig(
                            "reward definition does not exist".to_string(),
                        )
                    })?;
                Ok(RewardPlan::Direct(definition))
            }
            Some(RewardKind::PrizeWheel) => {
                let wheel_id = campaign.prize_wheel_id.ok_or_else(|| {
                    CampaignError::InvalidRewardConfig(
                        "prize-wheel campaign has no wheel".to_string(),
                    )
                })?;
                self.prize_wheels
                    .get(campaign.tenant_id, wheel_id)
                    .await?
                    .ok_or_else(|| {
                        CampaignError::InvalidRewardConfig("prize wheel does not exist".to_string())
                    })?;

                let options = self.prize_wheels.list_options(wheel_id).await?;
                if options.is_empty() {
                    return Err(CampaignError::InvalidRewardConfig(
                        "prize wheel has no options".to_string(),
                    ));
                }
                let total: f64 = options.iter().map(|o| o.weight).sum();
                if total <= 0.0 {
                    return Err(CampaignError::InvalidRewardConfig(
                        "prize option weights sum to zero".to_string(),
                    ));
                }
                Ok(RewardPlan::Wheel(options))
            }
            None => Err(CampaignError::InvalidRewardConfig(format!(
                "unrecognized reward kind {}",
                campaign.reward_kind
            ))),
        }
    }

    async fn issue_rewards(
        &self,
        campaign: &Campaign,
        plan: RewardPlan,
        recipients: &[Client],
    ) -> Result<HashMap<ClientId, RewardContext>, CampaignError> {
        match plan {
            RewardPlan::None => Ok(HashMap::new()),
            RewardPlan::Direct(definition) => {
                let issued = self
                    .rewards
                    .issue_direct_batch(campaign, &definition, recipients)
                    .await?;
                Ok(issued
                    .into_iter()
                    .map(|r| {
                        (
                            r.client_id,
                            RewardContext::Coupon {
                                code: r.code,
                                display_name: r.display_name,
                                valid_until: r.valid_until,
                            },
                        )
                    })
                    .collect())
            }
            RewardPlan::Wheel(options) => {
                let mut picks = Vec::with_capacity(recipients.len());
                for client in recipients {
                    let option = self
                        .prizes
                        .draw(&options)
                        .map_err(|e| CampaignError::InvalidRewardConfig(e.to_string()))?;
                    picks.push((client.id, option.clone()));
                }

                let issued = self.rewards.issue_prize_batch(campaign, &picks).await?;
                Ok(issued
                    .into_iter()
                    .map(|r| {
                        (
                            r.client_id,
                            RewardContext::PrizeDraw {
                                code: r.code,
                                display_name: r.display_name,
                                valid_until: r.valid_until,
                            },
                        )
                    })
                    .collect())
            }
        }
    }

    /// Send one message with sample placeholder values. No audience is
    /// resolved, no reward is issued and the campaign status is untouched.
    pub async fn send_test(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        address: &str,
    ) -> Result<(), CampaignError> {
        let campaign = self
            .campaigns
            .get(tenant_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let body = self.renderer.render_sample(&campaign.message_template);

        match tokio::time::timeout(self.send_timeout, self.transport.send(tenant_id, address, &body))
            .await
        {
            Ok(result) => result.map_err(CampaignError::from),
            Err(_) => Err(dineloop_common::Error::Transport(
                "Test send timed out".to_string(),
            )
            .into()),
        }
    }

    /// Current lifecycle status for the API layer
    pub async fn status(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<CampaignStatus, CampaignError> {
        let campaign = self
            .campaigns
            .get(tenant_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        campaign.status_enum().ok_or_else(|| {
            dineloop_common::Error::Internal(format!(
                "Campaign {} has invalid status {}",
                campaign_id, campaign.status
            ))
            .into()
        })
    }

    /// Dispatch and issuance totals for the dashboard layer
    pub async fn stats(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<CampaignStats, CampaignError> {
        let campaign = self
            .campaigns
            .get(tenant_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let counts = self.dispatch_records.counts_by_campaign(campaign_id).await?;
        let rewards_issued = self
            .issued_rewards
            .list_by_campaign(campaign_id)
            .await?
            .len() as i64;

        Ok(CampaignStats {
            campaign_id,
            status: campaign.status,
            sent: counts.sent,
            failed: counts.failed,
            rewards_issued,
        })
    }
}
