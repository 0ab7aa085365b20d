use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};
use url::Url;

use crate::core::data::coerce_risk;
use crate::error::{ApiError, ApiResult};

/// External readmission-risk model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RiskPredictor: Send + Sync {
    /// Risk percentage for the document at `document_url`.
    async fn predict(&self, document_url: &str) -> Result<f64>;

    async fn health(&self) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionReply {
    readmission_risk: Value,
}

/// Join target that keeps the base path, so `http://host/ml` + `predict`
/// becomes `http://host/ml/predict`.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid service url {}", raw))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub struct HttpPredictor {
    client: reqwest::Client,
    base: Url,
}

impl HttpPredictor {
    pub fn new(base_url_str: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base_url(base_url_str)?,
        })
    }
}

#[async_trait]
impl RiskPredictor for HttpPredictor {
    #[instrument(skip(self))]
    async fn predict(&self, document_url: &str) -> Result<f64> {
        let reply = self
            .client
            .post(self.base.join("predict")?)
            .json(&json!({ "documentUrl": document_url }))
            .send()
            .await?
            .error_for_status()?
            .json::<PredictionReply>()
            .await?;

        let risk = coerce_risk(&reply.readmission_risk)?;
        info!(risk, "prediction received");
        Ok(risk)
    }

    async fn health(&self) -> Result<Value> {
        let status = self
            .client
            .get(self.base.join("health")?)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(status)
    }
}

/// Rounds to the two decimals clients are shown, so stored and displayed
/// values agree.
pub fn round_risk(risk: f64) -> f64 {
    (risk * 100.0).round() / 100.0
}

/// Forwards the first document reference to the predictor.
pub async fn request_prediction(predictor: &dyn RiskPredictor, file_urls: &[String]) -> ApiResult<f64> {
    let document = file_urls
        .first()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::validation("No file URLs provided"))?;

    predictor
        .predict(document)
        .await
        .map(round_risk)
        .map_err(|e| ApiError::upstream("Failed to get prediction", format!("{:#}", e)))
}
