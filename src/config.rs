// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the blog API.
//!
//! Values are layered: built-in defaults, an optional `blog-api.toml` file,
//! `BLOG__`-prefixed environment variables (`BLOG__RATE_LIMIT__COMMENT__MAX_ACTIONS`),
//! and finally the conventional deployment variables such as `DATABASE_URL`
//! and `IP_SALT`.

use crate::models::ActionKind;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the blog API service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body, sized for post images (default: 10 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Document store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Client identity hashing configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Comment validation bounds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Third-party services
    #[serde(default)]
    pub integrations: IntegrationsConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// SurrealDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Endpoint URL: `mem://`, `rocksdb://path` or a remote `ws://host:port`
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_database_name")]
    pub database: String,
}

/// Identity hashing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Secret salt mixed into every client address digest
    #[serde(default)]
    pub salt: Option<String>,
}

/// Cap and window for one action kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionLimit {
    /// Maximum admitted actions per window
    pub max_actions: u32,

    /// Sliding window length in seconds
    pub window_secs: u64,
}

/// Sliding-window rate limits per action kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Comment submissions (default: 3 per hour)
    #[serde(default = "default_comment_limit")]
    pub comment: ActionLimit,

    /// Upvotes (default: 10 per 5 minutes)
    #[serde(default = "default_upvote_limit")]
    pub upvote: ActionLimit,

    /// How often stale rate-limit events are purged (default: 60)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// Length bounds applied to submitted comments, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_author_min")]
    pub author_min_chars: usize,

    #[serde(default = "default_author_max")]
    pub author_max_chars: usize,

    #[serde(default = "default_content_min")]
    pub content_min_chars: usize,

    #[serde(default = "default_content_max")]
    pub content_max_chars: usize,
}

/// Credentials and endpoints for the external collaborators.
///
/// Every integration is optional; one with missing credentials is simply
/// not constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    /// Public site URL used to build post links in notification emails
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,

    /// Unsigned upload preset configured in the Cloudinary console
    #[serde(default)]
    pub cloudinary_upload_preset: Option<String>,

    #[serde(default = "default_cloudinary_folder")]
    pub cloudinary_folder: String,

    #[serde(default = "default_cloudinary_api_base")]
    pub cloudinary_api_base: String,

    #[serde(default)]
    pub sendgrid_api_key: Option<String>,

    #[serde(default)]
    pub sendgrid_list_id: Option<String>,

    #[serde(default)]
    pub sendgrid_sender_id: Option<u64>,

    #[serde(default = "default_sendgrid_api_base")]
    pub sendgrid_api_base: String,

    #[serde(default)]
    pub mailgun_api_key: Option<String>,

    /// Mailing list address, e.g. `readers@mg.example.com`
    #[serde(default)]
    pub mailgun_list: Option<String>,

    #[serde(default = "default_mailgun_api_base")]
    pub mailgun_api_base: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_database_url() -> String {
    "mem://".to_string()
}

fn default_namespace() -> String {
    "blog".to_string()
}

fn default_database_name() -> String {
    "blog".to_string()
}

fn default_comment_limit() -> ActionLimit {
    ActionLimit {
        max_actions: 3,
        window_secs: 60 * 60,
    }
}

fn default_upvote_limit() -> ActionLimit {
    ActionLimit {
        max_actions: 10,
        window_secs: 5 * 60,
    }
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_author_min() -> usize {
    2
}

fn default_author_max() -> usize {
    50
}

fn default_content_min() -> usize {
    10
}

fn default_content_max() -> usize {
    1000
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_cloudinary_folder() -> String {
    "blog_posts".to_string()
}

fn default_cloudinary_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_sendgrid_api_base() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_mailgun_api_base() -> String {
    "https://api.mailgun.net".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            database: DatabaseConfig::default(),
            identity: IdentityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            integrations: IntegrationsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            namespace: default_namespace(),
            database: default_database_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            comment: default_comment_limit(),
            upvote: default_upvote_limit(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            author_min_chars: default_author_min(),
            author_max_chars: default_author_max(),
            content_min_chars: default_content_min(),
            content_max_chars: default_content_max(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
            cloudinary_folder: default_cloudinary_folder(),
            cloudinary_api_base: default_cloudinary_api_base(),
            sendgrid_api_key: None,
            sendgrid_list_id: None,
            sendgrid_sender_id: None,
            sendgrid_api_base: default_sendgrid_api_base(),
            mailgun_api_key: None,
            mailgun_list: None,
            mailgun_api_base: default_mailgun_api_base(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl ActionLimit {
    /// Get the sliding window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl RateLimitConfig {
    /// Limit that applies to the given action kind.
    pub fn limit_for(&self, kind: ActionKind) -> ActionLimit {
        match kind {
            ActionKind::Comment => self.comment,
            ActionKind::Upvote => self.upvote,
        }
    }

    /// Get the stale-event sweep interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from `blog-api.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let origins = env("ALLOWED_ORIGINS").map(|v| {
            v.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect::<Vec<_>>()
        });

        config::Config::builder()
            .add_source(config::File::with_name("blog-api").required(false))
            .add_source(
                config::Environment::with_prefix("BLOG")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("bind_addr", env("BIND_ADDR"))?
            .set_override_option("allowed_origins", origins)?
            .set_override_option("database.url", env("DATABASE_URL"))?
            .set_override_option("identity.salt", env("IP_SALT"))?
            .set_override_option("integrations.public_base_url", env("PUBLIC_BASE_URL"))?
            .set_override_option(
                "integrations.cloudinary_cloud_name",
                env("CLOUDINARY_CLOUD_NAME"),
            )?
            .set_override_option(
                "integrations.cloudinary_upload_preset",
                env("CLOUDINARY_UPLOAD_PRESET"),
            )?
            .set_override_option("integrations.sendgrid_api_key", env("SENDGRID_API_KEY"))?
            .set_override_option("integrations.sendgrid_list_id", env("SENDGRID_LIST_ID"))?
            .set_override_option("integrations.sendgrid_sender_id", env("SENDGRID_SENDER_ID"))?
            .set_override_option("integrations.mailgun_api_key", env("MAILGUN_API_KEY"))?
            .set_override_option("integrations.mailgun_list", env("MAILGUN_MAILING_LIST"))?
            .build()?
            .try_deserialize()
    }
}

/// Read a non-empty environment variable.
fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = RateLimitConfig::default();

        let comment = config.limit_for(ActionKind::Comment);
        assert_eq!(comment.max_actions, 3);
        assert_eq!(comment.window_duration(), Duration::from_secs(3600));

        let upvote = config.limit_for(ActionKind::Upvote);
        assert_eq!(upvote.max_actions, 10);
        assert_eq!(upvote.window_duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                "[rate_limit.comment]\nmax_actions = 5\nwindow_secs = 60\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.rate_limit.comment.max_actions, 5);
        assert_eq!(config.rate_limit.upvote.max_actions, 10);
        assert_eq!(config.validation.author_max_chars, 50);
        assert_eq!(config.database.url, "mem://");
        assert!(config.identity.salt.is_none());
    }
}
