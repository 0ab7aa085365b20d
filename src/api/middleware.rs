use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use anyhow::anyhow;
use tracing::debug;

use super::AppState;
use crate::error::ApiError;
use crate::models::Hospital;

/// The hospital named by a valid bearer token. Handlers taking this
/// extractor are only reached with a live account.
#[derive(Debug, Clone)]
pub struct AuthenticatedHospital(pub Hospital);

impl AuthenticatedHospital {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequest for AuthenticatedHospital {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| ApiError::Internal(anyhow!("application state not configured")))?;
            let Some(token) = token else {
                debug!("request without bearer token");
                return Err(ApiError::Unauthorized);
            };

            let claims = state.tokens.verify(&token)?;
            let hospital = state
                .db
                .find_hospital(&claims.sub)
                .await?
                .ok_or(ApiError::Unauthorized)?;
            Ok(Self(hospital))
        })
    }
}
