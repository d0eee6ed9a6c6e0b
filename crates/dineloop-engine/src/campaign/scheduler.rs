//! Deferred Scheduler - future point-in-time campaign triggers
//!
//! Owns its pending-trigger state and is injected into the lifecycle
//! controller; nothing else touches the trigger map.

use chrono::{DateTime, Utc};
use dineloop_common::types::CampaignId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

struct PendingTrigger {
    generation: u64,
    abort: AbortHandle,
}

#[derive(Default)]
struct SchedulerState {
    next_generation: u64,
    pending: HashMap<CampaignId, PendingTrigger>,
}

/// Deferred scheduler with at most one pending trigger per campaign
pub struct CampaignScheduler {
    state: Mutex<SchedulerState>,
}

impl CampaignScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Register `callback` to run once at `trigger_at`.
    ///
    /// A pending trigger for the same campaign is cancelled first. An instant
    /// already in the past is not registered; the caller re-checks campaign
    /// eligibility instead. The trigger deregisters itself before the
    /// callback runs, so one registration can never fire twice.
    pub async fn schedule<F>(
        self: &Arc<Self>,
        campaign_id: CampaignId,
        trigger_at: DateTime<Utc>,
        callback: F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = match (trigger_at - Utc::now()).to_std() {
            Ok(delay) => delay,
            Err(_) => {
                warn!(%campaign_id, %trigger_at, "Trigger instant already passed, not scheduling");
                return;
            }
        };

        // The lock is held across the spawn: the task's first step re-locks
        // this state, so it cannot observe the map before the insert below.
        let mut state = self.state.lock().await;
        state.next_generation += 1;
        let generation = state.next_generation;

        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let fire = {
                let mut state = scheduler.state.lock().await;
                match state.pending.get(&campaign_id) {
                    Some(trigger) if trigger.generation == generation => {
                        state.pending.remove(&campaign_id);
                        true
                    }
                    _ => false,
                }
            };

            if fire {
                debug!(%campaign_id, "Deferred trigger firing");
                callback.await;
            }
        });

        if let Some(previous) = state.pending.insert(
            campaign_id,
            PendingTrigger {
                generation,
                abort: task.abort_handle(),
            },
        ) {
            previous.abort.abort();
            debug!(%campaign_id, "Replaced pending trigger");
        }
    }

    /// Cancel the pending trigger for a campaign. Safe no-op when none is
    /// pending; returns whether one was cancelled.
    pub async fn cancel(&self, campaign_id: CampaignId) -> bool {
        let mut state = self.state.lock().await;
        match state.pending.remove(&campaign_id) {
            Some(trigger) => {
                trigger.abort.abort();
                debug!(%campaign_id, "Pending trigger cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of triggers currently pending
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

impl Default for CampaignScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_fires_once_and_deregisters() {
        let scheduler = Arc::new(CampaignScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let campaign_id = Uuid::new_v4();

        scheduler
            .schedule(
                campaign_id,
                Utc::now() + ChronoDuration::seconds(60),
                counter_callback(&fired),
            )
            .await;
        assert_eq!(scheduler.pending_count().await, 1);

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = Arc::new(CampaignScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let campaign_id = Uuid::new_v4();

        scheduler
            .schedule(
                campaign_id,
                Utc::now() + ChronoDuration::seconds(60),
                counter_callback(&fired),
            )
            .await;

        assert!(scheduler.cancel(campaign_id).await);
        // cancelling again is a no-op
        assert!(!scheduler.cancel(campaign_id).await);

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_trigger() {
        let scheduler = Arc::new(CampaignScheduler::new());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let campaign_id = Uuid::new_v4();

        scheduler
            .schedule(
                campaign_id,
                Utc::now() + ChronoDuration::seconds(60),
                counter_callback(&first),
            )
            .await;
        scheduler
            .schedule(
                campaign_id,
                Utc::now() + ChronoDuration::seconds(300),
                counter_callback(&second),
            )
            .await;
        assert_eq!(scheduler.pending_count().await, 1);

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_instant_is_not_registered() {
        let scheduler = Arc::new(CampaignScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler
            .schedule(
                Uuid::new_v4(),
                Utc::now() - ChronoDuration::seconds(1),
                counter_callback(&fired),
            )
            .await;

        assert_eq!(scheduler.pending_count().await, 0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_for_different_campaigns_coexist() {
        let scheduler = Arc::new(CampaignScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            scheduler
                .schedule(
                    Uuid::new_v4(),
                    Utc::now() + ChronoDuration::seconds(30),
                    counter_callback(&fired),
                )
                .await;
        }
        assert_eq!(scheduler.pending_count().await, 3);

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
