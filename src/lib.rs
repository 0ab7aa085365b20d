//! ReAdmit core library
//!
//! Hospital accounts, tenant-scoped patient records, weekly readmission
//! statistics and the proxies to the prediction and recommendation services.

pub mod api;
pub mod auth;
pub mod client;
pub mod core;
pub mod db;
pub mod error;
pub mod models;
pub mod telemetry;

/// Application configuration
pub mod config {
    use serde::Deserialize;

    pub const DEFAULT_JWT_SECRET: &str = "readmit-development-secret";

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub environment: Environment,
        pub server: ServerConfig,
        pub database: DatabaseConfig,
        pub auth: AuthConfig,
        pub services: ServicesConfig,
        pub stats: StatsConfig,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Environment {
        Development,
        Production,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
        /// `*` allows any origin.
        pub cors_origin: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DatabaseConfig {
        pub url: String,
        pub max_connections: u32,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct AuthConfig {
        pub jwt_secret: String,
        pub token_ttl_days: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServicesConfig {
        pub prediction_url: String,
        pub generator_url: String,
        pub generator_api_key: Option<String>,
        pub timeout_secs: u64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct StatsConfig {
        /// Offset from UTC used to find local week boundaries.
        pub utc_offset_minutes: i32,
    }

    impl Config {
        pub fn is_production(&self) -> bool {
            self.environment == Environment::Production
        }
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Config, config::ConfigError> {
        let env = std::env::var("READMIT_ENV").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .set_default("environment", env.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.cors_origin", "*")?
            .set_default("database.url", "sqlite://readmit.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.jwt_secret", DEFAULT_JWT_SECRET)?
            .set_default("auth.token_ttl_days", 30)?
            .set_default("services.prediction_url", "http://127.0.0.1:5001")?
            .set_default("services.generator_url", "http://127.0.0.1:5002/generate")?
            .set_default("services.timeout_secs", 10)?
            .set_default("stats.utc_offset_minutes", 0)?
            // Start with default settings
            .add_source(config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables
            .add_source(
                config::Environment::with_prefix("READMIT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
