use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::core::prediction::base_url;
use crate::models::prediction::{PredictRequest, PredictionResult};
use crate::models::recommendation::{RecommendationRequest, RecommendationResponse};
use crate::models::{Hospital, LoginRequest, Patient, PatientInput, ProfileUpdate, RegisterRequest, WeeklyStats};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx reply; carries the server's `message`.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub hospital_info: Hospital,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub hospital: Hospital,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEnvelope {
    hospital_info: Hospital,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalBody {
    is_approved: bool,
}

/// Typed client for the `/api` surface. `base` is the api root, e.g.
/// `http://localhost:5000/api`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: base_url(base)?,
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `base` plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api request");

        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ClientError::Api { status, message });
        }
        Ok(response.json::<T>().await?)
    }

    fn body(value: &impl Serialize) -> Result<Option<Value>, ClientError> {
        serde_json::to_value(value)
            .map(Some)
            .map_err(|e| ClientError::Config(e.into()))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.send(Method::POST, &["auth", "register"], Self::body(request)?).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.send(Method::POST, &["auth", "login"], Self::body(request)?).await
    }

    pub async fn verify(&self) -> Result<VerifyResponse, ClientError> {
        self.send(Method::GET, &["auth", "verify"], None).await
    }

    pub async fn me(&self) -> Result<Hospital, ClientError> {
        let envelope: DataEnvelope<Hospital> = self.send(Method::GET, &["auth", "me"], None).await?;
        Ok(envelope.data)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Hospital, ClientError> {
        let envelope: ProfileEnvelope = self
            .send(Method::PUT, &["auth", "profile"], Self::body(update)?)
            .await?;
        Ok(envelope.hospital_info)
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>, ClientError> {
        self.send(Method::GET, &["patients"], None).await
    }

    pub async fn get_patient(&self, id: &str) -> Result<Patient, ClientError> {
        self.send(Method::GET, &["patients", id], None).await
    }

    pub async fn create_patient(&self, input: &PatientInput) -> Result<Patient, ClientError> {
        self.send(Method::POST, &["patients"], Self::body(input)?).await
    }

    pub async fn update_patient(&self, id: &str, input: &PatientInput) -> Result<Patient, ClientError> {
        self.send(Method::PUT, &["patients", id], Self::body(input)?)
            .await
    }

    /// Returns the deleted id.
    pub async fn delete_patient(&self, id: &str) -> Result<String, ClientError> {
        let envelope: DataEnvelope<String> = self
            .send(Method::DELETE, &["patients", id], None)
            .await?;
        Ok(envelope.data)
    }

    pub async fn set_approval(&self, id: &str, approved: bool) -> Result<Patient, ClientError> {
        let body = Self::body(&ApprovalBody { is_approved: approved })?;
        self.send(Method::PATCH, &["patients", id, "approval"], body)
            .await
    }

    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictionResult, ClientError> {
        self.send(Method::POST, &["patients", "predict"], Self::body(request)?)
            .await
    }

    pub async fn prediction_health(&self) -> Result<Value, ClientError> {
        self.send(Method::GET, &["patients", "predict", "health"], None).await
    }

    pub async fn weekly_stats(&self) -> Result<WeeklyStats, ClientError> {
        self.send(Method::GET, &["stats", "weekly"], None).await
    }

    pub async fn recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, ClientError> {
        self.send(Method::POST, &["recommendations"], Self::body(request)?)
            .await
    }
}
