mod settings;

pub use settings::{
    DatabaseConfig, EventBusConfig, GitLabConfig, IntegrationsConfig, JiraConfig, JwtConfig,
    OtelConfig, RetentionConfig, ServerConfig, Settings, SheetsConfig, UploadConfig,
};
