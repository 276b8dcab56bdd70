// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Layered configuration: a TOML file overlaid with `NOTIFY_`-prefixed
//! environment variables, grounded on the teacher's `Settings::load`
//! (same `config` crate, same prefix/separator convention, generalized
//! from one SMTP destination to the whole provider set).

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub slack: WebhookConfig,
    #[serde(default)]
    pub telegram: TokenConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub teams: WebhookConfig,
    #[serde(default)]
    pub onesignal: OneSignalConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            tcp: TcpConfig::default(),
            queue: QueueConfig::default(),
            stream: StreamConfig::default(),
            template_dir: default_template_dir(),
            smtp: SmtpConfig::default(),
            slack: WebhookConfig::default(),
            telegram: TokenConfig::default(),
            twilio: TwilioConfig::default(),
            teams: WebhookConfig::default(),
            onesignal: OneSignalConfig::default(),
        }
    }
}

impl Settings {
    /// Loads from the given TOML file, then overlays any `NOTIFY_*`
    /// environment variable (`NOTIFY_SMTP__FROM_EMAIL` -> `smtp.from_email`).
    pub fn load(file_name: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("resources/templates")
}

/// Broker config: the Redis instance backing pub/sub and the stream.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "redis_default_url")]
    pub url: String,
    #[serde(default = "redis_default_channel")]
    pub channel: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: redis_default_url(),
            channel: redis_default_channel(),
        }
    }
}

fn redis_default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn redis_default_channel() -> String {
    "NotifyChannel".to_string()
}

/// TCP ingress config (§4.8, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct TcpConfig {
    #[serde(default = "tcp_default_host")]
    pub host: String,
    #[serde(default = "tcp_default_port")]
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: tcp_default_host(),
            port: tcp_default_port(),
        }
    }
}

fn tcp_default_host() -> String {
    hostname()
}

fn tcp_default_port() -> u16 {
    8991
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string())
}

/// Bounded queue config (§4.7).
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "queue_default_size")]
    pub size: usize,
    #[serde(default)]
    pub callback: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            size: queue_default_size(),
            callback: None,
        }
    }
}

fn queue_default_size() -> usize {
    8
}

/// Stream ingress config (§4.10, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "stream_default_name")]
    pub name: String,
    #[serde(default = "stream_default_group")]
    pub group: String,
    #[serde(default)]
    pub consumer_name: Option<String>,
    #[serde(default = "stream_default_retention_days")]
    pub retention_days: i64,
    #[serde(default)]
    pub notify_empty_stream: bool,
    #[serde(default = "stream_default_empty_stream_minutes")]
    pub empty_stream_minutes: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: stream_default_name(),
            group: stream_default_group(),
            consumer_name: None,
            retention_days: stream_default_retention_days(),
            notify_empty_stream: false,
            empty_stream_minutes: stream_default_empty_stream_minutes(),
        }
    }
}

fn stream_default_name() -> String {
    "NotifyWorkerStream".to_string()
}

fn stream_default_group() -> String {
    "NotifyWorkerGroup".to_string()
}

fn stream_default_retention_days() -> i64 {
    7
}

fn stream_default_empty_stream_minutes() -> i64 {
    10
}

/// SMTP provider config (§4.5), a simplified descendant of the teacher's
/// `SmtpConfig`/`SmtpUri` pair (scheme-driven STARTTLS vs. implicit TLS
/// dropped in favor of a single `use_starttls` flag, since §4.5 doesn't
/// call for the query-string dialect the teacher parsed out of a URL).
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "smtp_default_host")]
    pub host: String,
    #[serde(default = "smtp_default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "smtp_default_use_starttls")]
    pub use_starttls: bool,
    #[serde(default = "smtp_default_from_name")]
    pub from_name: String,
    #[serde(default = "smtp_default_from_email")]
    pub from_email: String,
    #[serde(default = "smtp_default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: smtp_default_host(),
            port: smtp_default_port(),
            username: None,
            password: None,
            use_starttls: smtp_default_use_starttls(),
            from_name: smtp_default_from_name(),
            from_email: smtp_default_from_email(),
            batch_timeout_secs: smtp_default_batch_timeout_secs(),
        }
    }
}

fn smtp_default_host() -> String {
    "localhost".to_string()
}

fn smtp_default_port() -> u16 {
    25
}

fn smtp_default_use_starttls() -> bool {
    true
}

fn smtp_default_from_name() -> String {
    "Notify".to_string()
}

fn smtp_default_from_email() -> String {
    "no-reply@example.org".to_string()
}

fn smtp_default_batch_timeout_secs() -> u64 {
    60
}

/// Shared shape for the webhook-style chat providers (Slack, Teams).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Shared shape for bearer-token HTTP providers (Telegram).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub from_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OneSignalConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_when_no_file_present() {
        let settings = Settings::load("./does-not-exist.toml").unwrap();
        assert_eq!(settings.queue.size, 8);
        assert_eq!(settings.tcp.port, 8991);
    }

    #[test]
    fn env_vars_overwrite_file_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[smtp]\nfrom_email = \"file@example.org\"").unwrap();

        std::env::set_var("NOTIFY_SMTP__FROM_EMAIL", "env@example.org");
        let settings = Settings::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.smtp.from_email, "env@example.org");
        std::env::remove_var("NOTIFY_SMTP__FROM_EMAIL");
    }
}
