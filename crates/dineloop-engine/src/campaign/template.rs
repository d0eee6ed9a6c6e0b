//! Template Renderer - personalization of campaign messages

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use dineloop_storage::models::Client;
use sha2::{Digest, Sha256};

/// Reward data available to a message template.
///
/// One variant per reward kind; the renderer matches exhaustively, so a new
/// kind cannot silently reuse another variant's payload.
#[derive(Debug, Clone)]
pub enum RewardContext {
    /// The campaign grants nothing
    None,
    /// A directly issued coupon, presented by code
    Coupon {
        code: String,
        display_name: String,
        valid_until: DateTime<Utc>,
    },
    /// A prize-wheel result, claimed through a tokenized link
    PrizeDraw {
        code: String,
        display_name: String,
        valid_until: DateTime<Utc>,
    },
}

/// Template renderer for personalizing campaign messages
#[derive(Clone)]
pub struct TemplateRenderer {
    /// Base URL for prize-claim links
    claim_base_url: String,
}

impl TemplateRenderer {
    pub fn new(claim_base_url: String) -> Self {
        Self { claim_base_url }
    }

    /// Render a template for one client.
    ///
    /// Substitution is whole-token, case-sensitive and single-pass:
    /// substituted text is never re-scanned for further placeholders. A token
    /// with no value in the current context stays literal in the output,
    /// which keeps configuration mistakes visible to the tenant.
    pub fn render(&self, template: &str, client: &Client, reward: &RewardContext) -> String {
        let mut values: Vec<(&str, String)> = Vec::new();

        if let Some(first) = client.name.as_deref().and_then(|n| n.split_whitespace().next()) {
            values.push(("{{first_name}}", first.to_string()));
        }

        match reward {
            RewardContext::None => {}
            RewardContext::Coupon {
                code,
                display_name,
                valid_until,
            } => {
                values.push(("{{reward_code}}", code.clone()));
                values.push(("{{reward_name}}", display_name.clone()));
                values.push(("{{valid_until}}", format_date(valid_until)));
            }
            RewardContext::PrizeDraw {
                code,
                display_name,
                valid_until,
            } => {
                values.push(("{{reward_code}}", self.claim_url(code)));
                values.push(("{{reward_name}}", display_name.clone()));
                values.push(("{{valid_until}}", format_date(valid_until)));
            }
        }

        substitute(template, &values)
    }

    /// Render with synthetic placeholder values, used by test sends
    pub fn render_sample(&self, template: &str) -> String {
        let values = vec![
            ("{{first_name}}", "Alex".to_string()),
            ("{{reward_code}}", "SAMPLE2468".to_string()),
            ("{{reward_name}}", "Sample reward".to_string()),
            ("{{valid_until}}", format_date(&(Utc::now() + Duration::days(30)))),
        ];
        substitute(template, &values)
    }

    /// Claim link for a prize-draw code
    pub fn claim_url(&self, code: &str) -> String {
        format!("{}/{}", self.claim_base_url, claim_token(code))
    }
}

/// Single-pass placeholder substitution
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        match rest.find("}}") {
            Some(end) => {
                let token = &rest[..end + 2];
                match values.iter().find(|(name, _)| *name == token) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(token),
                }
                rest = &rest[end + 2..];
            }
            None => {
                out.push_str(rest);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Tenant-facing date format
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Opaque claim token: the code plus a sha256 prefix, base64url encoded
fn claim_token(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let hash = hasher.finalize();

    let token_data = format!("{}:{}", code, hex::encode(&hash[..8]));
    URL_SAFE_NO_PAD.encode(token_data.as_bytes())
}
