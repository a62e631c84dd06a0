use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub events: EventBusConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes (uploads included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Attachment storage backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// "disk" or "database"
    #[serde(default = "default_upload_backend")]
    pub backend: String,
    #[serde(default = "default_upload_dir")]
    pub directory: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    /// Broadcast channel capacity; lagging listeners drop events beyond this
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Sweep interval in seconds
    #[serde(default = "default_retention_interval")]
    pub sweep_interval_seconds: u64,
    /// Days a soft-deleted row is kept before it is purged
    #[serde(default = "default_retention_days")]
    pub soft_delete_days: i64,
    /// Days a read notification is kept
    #[serde(default = "default_notification_days")]
    pub read_notification_days: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    /// Google Apps Script web-app endpoint URL
    pub script_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            email: None,
            api_token: None,
            timeout_seconds: default_http_timeout(),
        }
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_seconds: default_http_timeout(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            script_url: None,
            api_key: None,
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_upload_backend() -> String {
    "disk".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_event_capacity() -> usize {
    1024
}

fn default_retention_interval() -> u64 {
    3600
}

fn default_retention_days() -> i64 {
    30
}

fn default_notification_days() -> i64 {
    90
}

fn default_http_timeout() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "qahub".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.pool_size", 10)?
            .set_default("events.capacity", 1024)?
            .set_default("retention.sweep_interval_seconds", 3600)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, DATABASE_URL, JWT_SECRET, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: default_upload_backend(),
            directory: default_upload_dir(),
            max_file_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_retention_interval(),
            soft_delete_days: default_retention_days(),
            read_notification_days: default_notification_days(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
        assert_eq!(server.max_body_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_retention_defaults() {
        let retention = RetentionConfig::default();
        assert_eq!(retention.soft_delete_days, 30);
        assert_eq!(retention.read_notification_days, 90);
    }

    #[test]
    fn test_integrations_default_unconfigured() {
        let integrations = IntegrationsConfig::default();
        assert!(integrations.jira.base_url.is_none());
        assert!(integrations.gitlab.token.is_none());
        assert!(integrations.sheets.script_url.is_none());
    }
}
