use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::{AppState, AuthenticatedHospital};
use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::models::hospital::normalize_email;
use crate::models::{Hospital, LoginRequest, ProfileUpdate, RegisterRequest};

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner().trimmed();
    request.validate()?;

    if state.db.find_hospital_by_email(&request.email).await?.is_some() {
        return Err(ApiError::validation("Hospital with this email already exists"));
    }

    let hospital = Hospital {
        id: Uuid::new_v4().to_string(),
        password_hash: hash_password(&request.password)?,
        name: request.name,
        email: request.email,
        department: request.department,
        physician_name: request.physician_name,
        address: String::new(),
        city: String::new(),
        phone: String::new(),
        facility_type: String::new(),
        beds: String::new(),
        staff: String::new(),
        created_at: Utc::now(),
    };
    state.db.insert_hospital(&hospital).await?;
    let token = state.tokens.issue(&hospital.id)?;

    info!(hospital_id = %hospital.id, "hospital registered");
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "token": token,
        "hospitalInfo": hospital,
    })))
}

#[instrument(skip(state, body))]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let LoginRequest { email, password } = body.into_inner();
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("Please provide email and password"));
    }

    let hospital = state
        .db
        .find_hospital_by_email(&normalize_email(&email))
        .await?
        .filter(|h| verify_password(&password, &h.password_hash))
        .ok_or_else(|| {
            warn!("login rejected");
            ApiError::InvalidCredentials
        })?;

    let token = state.tokens.issue(&hospital.id)?;
    info!(hospital_id = %hospital.id, "hospital logged in");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": token,
        "hospitalInfo": hospital,
    })))
}

pub async fn verify(auth: AuthenticatedHospital) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "valid": true, "hospital": auth.0 }))
}

pub async fn me(auth: AuthenticatedHospital) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": auth.0 }))
}

#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn update_profile(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    body: web::Json<ProfileUpdate>,
) -> ApiResult<HttpResponse> {
    let update = body.into_inner().trimmed();
    update.validate()?;

    let mut hospital = auth.0;
    if let Some(email) = update.email.as_deref() {
        if email != hospital.email
            && state.db.find_hospital_by_email(email).await?.is_some()
        {
            return Err(ApiError::validation("Hospital with this email already exists"));
        }
    }

    update.apply(&mut hospital);
    state.db.update_hospital(&hospital).await?;

    info!("profile updated");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "hospitalInfo": hospital })))
}
