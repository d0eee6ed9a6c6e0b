//! Throttled Dispatcher - per-recipient delivery with failure isolation

use super::template::{RewardContext, TemplateRenderer};
use crate::transport::MessageTransport;
use dineloop_common::types::{ClientId, ContactAddress};
use dineloop_common::Result;
use dineloop_storage::models::{Campaign, Client, CreateDispatchRecord, DeliveryOutcome};
use dineloop_storage::repository::DispatchRecordRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-campaign dispatch result
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<(ClientId, String)>,
}

/// Sends personalized messages one recipient at a time.
///
/// The inter-message delay is a rate limit agreed with the messaging
/// provider, not tunable away for speed.
pub struct ThrottledDispatcher {
    transport: Arc<dyn MessageTransport>,
    renderer: TemplateRenderer,
    dispatch_records: Arc<dyn DispatchRecordRepository>,
    send_timeout: Duration,
}

impl ThrottledDispatcher {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        renderer: TemplateRenderer,
        dispatch_records: Arc<dyn DispatchRecordRepository>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            renderer,
            dispatch_records,
            send_timeout,
        }
    }

    /// Dispatch to every recipient in order. Individual failures are logged
    /// and recorded; only the inability to load prior dispatch state aborts.
    pub async fn dispatch_all(
        &self,
        campaign: &Campaign,
        clients: &[Client],
        rewards: &HashMap<ClientId, RewardContext>,
    ) -> Result<DispatchOutcome> {
        let already_sent = self.dispatch_records.sent_client_ids(campaign.id).await?;
        let delay = Duration::from_millis(campaign.dispatch_delay_ms.max(0) as u64);
        let mut outcome = DispatchOutcome::default();

        for (index, client) in clients.iter().enumerate() {
            let Some(address) = client
                .email
                .as_deref()
                .filter(|a| ContactAddress::parse(a).is_some())
            else {
                debug!(
                    campaign_id = %campaign.id,
                    client_id = %client.id,
                    "No usable contact address, skipping"
                );
                outcome.skipped += 1;
                continue;
            };

            if already_sent.contains(&client.id) {
                debug!(
                    campaign_id = %campaign.id,
                    client_id = %client.id,
                    "Already delivered in a previous run, skipping"
                );
                outcome.skipped += 1;
                continue;
            }

            let reward = rewards.get(&client.id).unwrap_or(&RewardContext::None);
            let body = self
                .renderer
                .render(&campaign.message_template, client, reward);

            let send = self.transport.send(campaign.tenant_id, address, &body);
            let result = match tokio::time::timeout(self.send_timeout, send).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("Send timed out after {:?}", self.send_timeout)),
            };

            match result {
                Ok(()) => {
                    outcome.sent += 1;
                    self.record(campaign, client, address, DeliveryOutcome::Sent, None)
                        .await;
                }
                Err(reason) => {
                    warn!(
                        campaign_id = %campaign.id,
                        client_id = %client.id,
                        error = %reason,
                        "Dispatch failed for recipient"
                    );
                    outcome.failed += 1;
                    self.record(
                        campaign,
                        client,
                        address,
                        DeliveryOutcome::Failed,
                        Some(reason.clone()),
                    )
                    .await;
                    outcome.failures.push((client.id, reason));
                }
            }

            if !delay.is_zero() && index + 1 < clients.len() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(outcome)
    }

    async fn record(
        &self,
        campaign: &Campaign,
        client: &Client,
        address: &str,
        outcome: DeliveryOutcome,
        error: Option<String>,
    ) {
        let input = CreateDispatchRecord {
            tenant_id: campaign.tenant_id,
            campaign_id: campaign.id,
            client_id: client.id,
            address: address.to_string(),
            outcome,
            error,
        };

        if let Err(e) = self.dispatch_records.record(input).await {
            error!(
                campaign_id = %campaign.id,
                client_id = %client.id,
                error = %e,
                "Failed to persist dispatch record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::{client_with_email, FakeTransport};
    use chrono::Utc;
    use dineloop_common::types::{AudienceCriterion, RewardKind};
    use dineloop_storage::models::CreateCampaign;
    use dineloop_storage::repository::{CampaignRepository, MemoryCampaignRepository, MemoryDispatchRecordRepository};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Fixture {
        transport: Arc<FakeTransport>,
        dispatch_records: Arc<MemoryDispatchRecordRepository>,
        dispatcher: ThrottledDispatcher,
        campaign: Campaign,
    }

    async fn fixture(dispatch_delay_ms: i64) -> Fixture {
        let transport = Arc::new(FakeTransport::new());
        let dispatch_records = Arc::new(MemoryDispatchRecordRepository::default());
        let dispatcher = ThrottledDispatcher::new(
            transport.clone(),
            TemplateRenderer::new("https://rewards.example.com/claim".to_string()),
            dispatch_records.clone(),
            Duration::from_secs(5),
        );

        let campaigns = MemoryCampaignRepository::default();
        let campaign = campaigns
            .create(CreateCampaign {
                tenant_id: Uuid::new_v4(),
                name: "Dinner push".to_string(),
                message_template: "Hello {{first_name}}".to_string(),
                reward_kind: RewardKind::None,
                reward_definition_id: None,
                prize_wheel_id: None,
                audience: AudienceCriterion::All,
                dispatch_delay_ms: Some(dispatch_delay_ms),
                reward_valid_until: None,
                scheduled_at: None,
            })
            .await
            .unwrap();

        Fixture {
            transport,
            dispatch_records,
            dispatcher,
            campaign,
        }
    }

    #[tokio::test]
    async fn test_per_recipient_failure_does_not_abort_the_loop() {
        let fixture = fixture(0).await;
        let tenant_id = fixture.campaign.tenant_id;
        let clients = vec![
            client_with_email(tenant_id, Some("one@example.com")),
            client_with_email(tenant_id, Some("two@example.com")),
            client_with_email(tenant_id, Some("three@example.com")),
        ];
        fixture.transport.fail_for("two@example.com").await;

        let outcome = fixture
            .dispatcher
            .dispatch_all(&fixture.campaign, &clients, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, clients[1].id);

        let counts = fixture
            .dispatch_records
            .counts_by_campaign(fixture.campaign.id)
            .await
            .unwrap();
        assert_eq!((counts.sent, counts.failed), (2, 1));
    }

    #[tokio::test]
    async fn test_clients_without_address_are_skipped_not_failed() {
        let fixture = fixture(0).await;
        let tenant_id = fixture.campaign.tenant_id;
        let clients = vec![
            client_with_email(tenant_id, None),
            client_with_email(tenant_id, Some("not-an-address")),
            client_with_email(tenant_id, Some("ok@example.com")),
        ];

        let outcome = fixture
            .dispatcher
            .dispatch_all(&fixture.campaign, &clients, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.skipped, 2);
    }

    #[tokio::test]
    async fn test_previously_delivered_clients_are_not_resent() {
        let fixture = fixture(0).await;
        let tenant_id = fixture.campaign.tenant_id;
        let clients = vec![
            client_with_email(tenant_id, Some("done@example.com")),
            client_with_email(tenant_id, Some("new@example.com")),
        ];

        fixture
            .dispatch_records
            .record(CreateDispatchRecord {
                tenant_id,
                campaign_id: fixture.campaign.id,
                client_id: clients[0].id,
                address: "done@example.com".to_string(),
                outcome: DeliveryOutcome::Sent,
                error: None,
            })
            .await
            .unwrap();

        let outcome = fixture
            .dispatcher
            .dispatch_all(&fixture.campaign, &clients, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(fixture.transport.sent_addresses().await, vec!["new@example.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_spaces_consecutive_sends() {
        let fixture = fixture(1_000).await;
        let tenant_id = fixture.campaign.tenant_id;
        let clients = vec![
            client_with_email(tenant_id, Some("a@example.com")),
            client_with_email(tenant_id, Some("b@example.com")),
            client_with_email(tenant_id, Some("c@example.com")),
        ];

        let started = tokio::time::Instant::now();
        let outcome = fixture
            .dispatcher
            .dispatch_all(&fixture.campaign, &clients, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.sent, 3);
        // two gaps between three sends
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_recipient_times_out_as_failure() {
        let fixture = fixture(0).await;
        let tenant_id = fixture.campaign.tenant_id;
        let clients = vec![
            client_with_email(tenant_id, Some("stuck@example.com")),
            client_with_email(tenant_id, Some("fine@example.com")),
        ];
        fixture.transport.stall_for("stuck@example.com").await;

        let outcome = fixture
            .dispatcher
            .dispatch_all(&fixture.campaign, &clients, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.sent, 1);
        assert!(outcome.failures[0].1.contains("timed out"));
    }
}
