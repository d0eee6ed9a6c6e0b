//! Availability Monitor - resumes campaigns paused on sender starvation

use super::manager::CampaignManager;
use chrono::Utc;
use dineloop_common::Result;
use dineloop_storage::models::CampaignStatus;
use dineloop_storage::repository::{CampaignRepository, SenderRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// One sweep's tally
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Paused campaigns found
    pub paused: usize,
    /// Campaigns handed back to the lifecycle controller
    pub resumed: usize,
}

/// Periodic sweep over paused campaigns.
///
/// Resumption goes back through `CampaignManager::schedule_processing` so a
/// resumed campaign follows the same lifecycle rules as any other trigger.
pub struct AvailabilityMonitor {
    campaigns: Arc<dyn CampaignRepository>,
    senders: Arc<dyn SenderRepository>,
    manager: Arc<CampaignManager>,
    sweep_interval: Duration,
}

impl AvailabilityMonitor {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        senders: Arc<dyn SenderRepository>,
        manager: Arc<CampaignManager>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            campaigns,
            senders,
            manager,
            sweep_interval,
        }
    }

    /// Run sweeps forever at the configured interval
    pub async fn run(&self) {
        let mut ticker = interval(self.sweep_interval);
        info!(interval_secs = self.sweep_interval.as_secs(), "Availability monitor started");

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                error!(error = %e, "Availability sweep failed");
            }
        }
    }

    /// One sweep, also callable on demand.
    ///
    /// The capacity probe asks for any available sender rather than matching
    /// each campaign against its own tenant's quota; per-campaign resume
    /// failures are isolated so the rest of the sweep proceeds.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let paused = self
            .campaigns
            .list_by_status(CampaignStatus::Paused)
            .await?;

        let mut report = SweepReport {
            paused: paused.len(),
            resumed: 0,
        };

        if paused.is_empty() {
            return Ok(report);
        }

        if self.senders.find_available().await?.is_none() {
            info!(
                paused = report.paused,
                "Still no sender capacity, leaving paused campaigns untouched"
            );
            return Ok(report);
        }

        for campaign in paused {
            let resumed = async {
                self.campaigns
                    .set_scheduled_at(campaign.id, Some(Utc::now()))
                    .await?;
                self.manager
                    .schedule_processing(campaign.tenant_id, campaign.id)
                    .await
                    .map_err(|e| dineloop_common::Error::Internal(e.to_string()))?;
                Ok::<(), dineloop_common::Error>(())
            }
            .await;

            match resumed {
                Ok(()) => {
                    debug!(campaign_id = %campaign.id, "Paused campaign resumed");
                    report.resumed += 1;
                }
                Err(e) => {
                    warn!(
                        campaign_id = %campaign.id,
                        error = %e,
                        "Failed to resume paused campaign"
                    );
                }
            }
        }

        info!(paused = report.paused, resumed = report.resumed, "Availability sweep finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::TestHarness;
    use async_trait::async_trait;
    use chrono::DateTime;
    use dineloop_common::types::{CampaignId, TenantId};
    use dineloop_common::Error;
    use dineloop_storage::models::{Campaign, CreateCampaign};
    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;

    /// Delegating repository that fails `set_scheduled_at` for one campaign
    struct FailingResume {
        inner: Arc<dyn CampaignRepository>,
        poisoned: Mutex<Option<CampaignId>>,
    }

    #[async_trait]
    impl CampaignRepository for FailingResume {
        async fn create(&self, input: CreateCampaign) -> dineloop_common::Result<Campaign> {
            self.inner.create(input).await
        }

        async fn get(
            &self,
            tenant_id: TenantId,
            id: CampaignId,
        ) -> dineloop_common::Result<Option<Campaign>> {
            self.inner.get(tenant_id, id).await
        }

        async fn find(&self, id: CampaignId) -> dineloop_common::Result<Option<Campaign>> {
            self.inner.find(id).await
        }

        async fn list_by_status(
            &self,
            status: CampaignStatus,
        ) -> dineloop_common::Result<Vec<Campaign>> {
            self.inner.list_by_status(status).await
        }

        async fn try_transition(
            &self,
            id: CampaignId,
            from: &[CampaignStatus],
            to: CampaignStatus,
        ) -> dineloop_common::Result<Option<Campaign>> {
            self.inner.try_transition(id, from, to).await
        }

        async fn set_scheduled_at(
            &self,
            id: CampaignId,
            scheduled_at: Option<DateTime<Utc>>,
        ) -> dineloop_common::Result<()> {
            if *self.poisoned.lock().await == Some(id) {
                return Err(Error::Database("connection reset".to_string()));
            }
            self.inner.set_scheduled_at(id, scheduled_at).await
        }

        async fn add_run_counts(
            &self,
            id: CampaignId,
            sent: i32,
            failed: i32,
        ) -> dineloop_common::Result<()> {
            self.inner.add_run_counts(id, sent, failed).await
        }
    }

    async fn paused_campaign(harness: &TestHarness) -> Campaign {
        let campaign = harness.create_campaign(harness.campaign_input()).await;
        harness
            .campaigns
            .try_transition(
                campaign.id,
                &[CampaignStatus::Draft],
                CampaignStatus::Processing,
            )
            .await
            .unwrap();
        harness
            .campaigns
            .try_transition(
                campaign.id,
                &[CampaignStatus::Processing],
                CampaignStatus::Paused,
            )
            .await
            .unwrap();
        campaign
    }

    fn monitor_for(harness: &TestHarness) -> AvailabilityMonitor {
        AvailabilityMonitor::new(
            harness.campaigns.clone(),
            harness.senders.clone(),
            harness.manager.clone(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_sweep_without_paused_campaigns_is_a_noop() {
        let harness = TestHarness::new();
        let monitor = monitor_for(&harness);

        let report = monitor.sweep().await.unwrap();

        assert_eq!(report, SweepReport { paused: 0, resumed: 0 });
    }

    #[tokio::test]
    async fn test_no_capacity_leaves_campaigns_paused_across_sweeps() {
        let harness = TestHarness::new();
        harness.seed_sender(100, 100).await;
        let campaign = paused_campaign(&harness).await;
        let monitor = monitor_for(&harness);

        for _ in 0..3 {
            let report = monitor.sweep().await.unwrap();
            assert_eq!(report, SweepReport { paused: 1, resumed: 0 });
            assert_eq!(harness.campaign_status(&campaign).await, "paused");
        }
    }

    #[tokio::test]
    async fn test_capacity_resumes_paused_campaigns() {
        let harness = TestHarness::new();
        harness.seed_sender(100, 0).await;
        harness.seed_client(Some("guest@example.com")).await;
        let campaign = paused_campaign(&harness).await;
        let monitor = monitor_for(&harness);

        let report = monitor.sweep().await.unwrap();
        assert_eq!(report, SweepReport { paused: 1, resumed: 1 });

        // the campaign went back through the normal pipeline
        tokio::task::yield_now().await;
        let status = harness.campaign_status(&campaign).await;
        assert!(status == "processing" || status == "sent");
    }

    #[tokio::test]
    async fn test_one_resume_failure_does_not_block_the_rest() {
        let harness = TestHarness::new();
        harness.seed_sender(100, 0).await;
        harness.seed_client(Some("guest@example.com")).await;
        let poisoned = paused_campaign(&harness).await;
        let healthy = paused_campaign(&harness).await;

        let campaigns = Arc::new(FailingResume {
            inner: harness.campaigns.clone(),
            poisoned: Mutex::new(Some(poisoned.id)),
        });
        let monitor = AvailabilityMonitor::new(
            campaigns,
            harness.senders.clone(),
            harness.manager.clone(),
            Duration::from_secs(60),
        );

        let report = monitor.sweep().await.unwrap();

        assert_eq!(report, SweepReport { paused: 2, resumed: 1 });
        assert_eq!(harness.campaign_status(&poisoned).await, "paused");
        tokio::task::yield_now().await;
        let status = harness.campaign_status(&healthy).await;
        assert!(status != "paused");
    }
}
