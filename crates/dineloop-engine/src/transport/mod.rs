//! Outbound message transport

mod smtp;

use async_trait::async_trait;
use dineloop_common::types::TenantId;
use dineloop_common::Result;

pub use smtp::SmtpTransport;

/// Message transport interface.
///
/// The engine only needs to hand one rendered body to one address; provider
/// details live behind this trait.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, tenant_id: TenantId, to: &str, body: &str) -> Result<()>;
}
