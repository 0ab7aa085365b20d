//! API error taxonomy and its mapping onto HTTP responses.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use once_cell::sync::OnceCell;
use serde_json::json;
use thiserror::Error;
use tracing::error;

static EXPOSE_DETAILS: OnceCell<bool> = OnceCell::new();

/// Enable upstream/internal error details in response bodies. Only the first
/// call has an effect; without a call details stay hidden. `serve` calls this
/// once with `AppState::expose_details`.
pub fn expose_details(enabled: bool) {
    let _ = EXPOSE_DETAILS.set(enabled);
}

fn details_exposed() -> bool {
    EXPOSE_DETAILS.get().copied().unwrap_or(false)
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Token missing, malformed, expired, or naming a deleted account.
    #[error("Not authorized to access this resource")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream { message: String, detail: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>, detail: impl ToString) -> Self {
        Self::Upstream {
            message: message.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();

        Self::Validation(messages.join(", "))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            ApiError::Upstream { message, detail } => {
                error!(%detail, "{}", message);
                if details_exposed() {
                    json!({ "success": false, "message": message, "error": detail })
                } else {
                    json!({ "success": false, "message": message })
                }
            }
            ApiError::Database(_) | ApiError::Internal(_) => {
                error!(error = ?self, "unhandled server error");
                if details_exposed() {
                    json!({ "success": false, "message": "Something went wrong!", "error": self.to_string() })
                } else {
                    json!({ "success": false, "message": "Something went wrong!" })
                }
            }
            other => json!({ "success": false, "message": other.to_string() }),
        };

        HttpResponse::build(status).json(body)
    }
}
