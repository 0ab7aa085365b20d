//! API module for ReAdmit
//!
//! REST surface, shared application state and the bearer-token extractor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::FixedOffset;

use crate::auth::TokenService;
use crate::config::Config;
use crate::core::ai::{AiService, HttpTextGenerator, TextGenerator};
use crate::core::prediction::{HttpPredictor, RiskPredictor};
use crate::db::Database;

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::AuthenticatedHospital;
pub use routes::configure;

/// Application state
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
    pub predictor: Arc<dyn RiskPredictor>,
    pub ai: AiService,
    pub utc_offset: FixedOffset,
    /// Whether upstream and internal error details reach clients. `serve`
    /// installs this process-wide through `error::expose_details`.
    pub expose_details: bool,
}

impl AppState {
    pub fn new(
        db: Database,
        config: &Config,
        predictor: Arc<dyn RiskPredictor>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let minutes = config.stats.utc_offset_minutes;
        let utc_offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| anyhow!("stats.utc_offset_minutes out of range: {}", minutes))?;

        Ok(Self {
            db,
            tokens: TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_days),
            predictor,
            ai: AiService::new(generator),
            utc_offset,
            expose_details: !config.is_production(),
        })
    }

    /// State wired to the HTTP prediction and text services named in `config`.
    pub fn from_config(db: Database, config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.timeout_secs);
        let predictor = HttpPredictor::new(&config.services.prediction_url, timeout)?;
        let generator = HttpTextGenerator::new(
            &config.services.generator_url,
            config.services.generator_api_key.clone(),
            timeout,
        )?;

        Self::new(db, config, Arc::new(predictor), Arc::new(generator))
    }
}
