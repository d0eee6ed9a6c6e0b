//! Configuration for DineLoop

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Campaign engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Outbound SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Sender address placed on outbound messages
    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default)]
    pub use_tls: bool,

    #[serde(default = "default_true")]
    pub use_starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            use_tls: false,
            use_starttls: true,
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_from_address() -> String {
    "no-reply@dineloop.app".to_string()
}

fn default_true() -> bool {
    true
}

/// Campaign engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between availability monitor sweeps
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    /// Upper bound on a single transport send
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Validity window applied to issued rewards when the campaign sets none
    #[serde(default = "default_reward_validity_days")]
    pub default_reward_validity_days: i64,

    /// Base URL for prize-claim links embedded in messages
    #[serde(default = "default_claim_base_url")]
    pub claim_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            default_reward_validity_days: default_reward_validity_days(),
            claim_base_url: default_claim_base_url(),
        }
    }
}

fn default_monitor_interval_secs() -> u64 {
    60
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_reward_validity_days() -> i64 {
    30
}

fn default_claim_base_url() -> String {
    "https://rewards.dineloop.app/claim".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter, e.g. "info" or "info,dineloop=debug"
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,dineloop=debug".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/dineloop/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config() {
        let engine = EngineConfig::default();
        assert_eq!(engine.monitor_interval_secs, 60);
        assert_eq!(engine.send_timeout_secs, 30);
        assert_eq!(engine.default_reward_validity_days, 30);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "postgres://localhost/dineloop"

            [engine]
            monitor_interval_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.engine.monitor_interval_secs, 15);
        assert!(config.smtp.use_starttls);
    }
}
