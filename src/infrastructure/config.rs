use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Shared secret the purchase provider sends on subscription changes.
    /// Empty disables the webhook.
    pub webhook_token: String,
    pub log_filter: String,
    /// Upper bound on candidates loaded per daily-match evaluation.
    pub candidate_pool_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MATCHGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("webhook_token", "")?
            .set_default("log_filter", "info")?
            .set_default("candidate_pool_limit", 500)?
            .build()?;

        config.try_deserialize()
    }
}
