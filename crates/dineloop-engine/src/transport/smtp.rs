//! SMTP message transport

use super::MessageTransport;
use async_trait::async_trait;
use dineloop_common::config::SmtpConfig;
use dineloop_common::types::TenantId;
use dineloop_common::{Error, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::debug;

/// Outbound SMTP transport
pub struct SmtpTransport {
    config: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        builder = builder.port(self.config.port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.timeout(Some(Duration::from_secs(30))).build())
    }
}

#[async_trait]
impl MessageTransport for SmtpTransport {
    async fn send(&self, tenant_id: TenantId, to: &str, body: &str) -> Result<()> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid recipient address {}: {}", to, e)))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Transport(format!("Failed to build message: {}", e)))?;

        let mailer = self.build_mailer()?;

        mailer
            .send(email)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        debug!(%tenant_id, to, "Message delivered via SMTP");
        Ok(())
    }
}
