//! Configuration management for Awareness services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`AWARENESS__` prefix, `__` section separator)
//! 2. Config file (`awareness.toml` by default)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::AwarenessError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AwarenessConfig {
    pub provider: ProviderConfig,
    pub email: EmailConfig,
    pub database: DatabaseConfig,
    pub report: ReportConfig,
    /// Optional JSON question catalog replacing the built-in one.
    pub catalog_path: Option<String>,
}

impl AwarenessConfig {
    /// Load configuration from `{file_prefix}.toml` (optional) layered under
    /// `AWARENESS__*` environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, AwarenessError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("AWARENESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: AwarenessConfig = cfg.try_deserialize()?;
        if loaded.provider.api_key.is_empty() {
            tracing::warn!("provider.api_key is empty; analysis requests will be rejected upstream");
        }
        if loaded.email.api_key().is_none() {
            tracing::info!("No email API key configured; reports will be logged instead of sent");
        }
        Ok(loaded)
    }
}

/// External analysis provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider API (default: "https://api.dify.ai/v1").
    pub base_url: String,
    pub api_key: String,
    /// Upper bound for one blocking analysis request.
    pub timeout_secs: u64,
    /// Extra time granted on top of `timeout_secs` before a generation is
    /// considered abandoned.
    pub grace_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Time after which a `GENERATING` report can no longer complete.
    pub fn abandon_after(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.saturating_add(self.grace_secs))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dify.ai/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            grace_secs: 15,
        }
    }
}

/// Transactional email settings. A missing API key selects log-only delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub from: String,
    pub subject: String,
    pub timeout_secs: u64,
}

impl EmailConfig {
    /// The API key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.resend.com".to_string(),
            from: "Investment Awareness <noreply@investmentawareness.com>".to_string(),
            subject: "Your Investment Awareness Analysis Report is Ready".to_string(),
            timeout_secs: 30,
        }
    }
}

/// SQLite storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./awareness.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

/// Report pipeline policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// When false, regenerate requests are acknowledged as queued for manual
    /// review and nothing is changed.
    pub regenerate_enabled: bool,
    /// Interval of the stale-generation sweep in daemon mode.
    pub sweep_interval_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            regenerate_enabled: true,
            sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AwarenessConfig::default();
        assert_eq!(config.provider.base_url, "https://api.dify.ai/v1");
        assert_eq!(config.provider.timeout(), Duration::from_secs(120));
        assert_eq!(config.provider.abandon_after(), Duration::from_secs(135));

        let extreme = ProviderConfig {
            timeout_secs: u64::MAX,
            grace_secs: 15,
            ..ProviderConfig::default()
        };
        assert_eq!(extreme.abandon_after(), Duration::from_secs(u64::MAX));
        assert!(config.email.api_key().is_none());
        assert!(config.report.regenerate_enabled);
        assert_eq!(config.database.max_connections, 8);
    }

    #[test]
    fn test_blank_email_key_is_absent() {
        let email = EmailConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(email.api_key().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("awareness.toml"),
            r#"
                [provider]
                api_key = "app-test"
                timeout_secs = 30

                [email]
                api_key = "re_test"

                [report]
                regenerate_enabled = false
            "#,
        )
        .unwrap();

        let prefix = dir.path().join("awareness");
        let config = AwarenessConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.provider.api_key, "app-test");
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.provider.grace_secs, 15);
        assert_eq!(config.email.api_key(), Some("re_test"));
        assert!(!config.report.regenerate_enabled);
        assert_eq!(config.database.path, "./awareness.db");
    }
}
