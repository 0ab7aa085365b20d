use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::{AppState, AuthenticatedHospital};
use crate::core::data::format_risk;
use crate::core::prediction::request_prediction;
use crate::error::{ApiError, ApiResult};
use crate::models::prediction::{PredictRequest, PredictionResult};
use crate::models::{Approval, Patient, PatientInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub is_approved: bool,
}

async fn owned_patient(state: &AppState, hospital_id: &str, id: &str) -> ApiResult<Patient> {
    state
        .db
        .get_patient(hospital_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))
}

#[instrument(skip(state, auth), fields(hospital_id = %auth.id()))]
pub async fn list(state: web::Data<AppState>, auth: AuthenticatedHospital) -> ApiResult<HttpResponse> {
    let patients = state.db.list_patients(auth.id()).await?;
    Ok(HttpResponse::Ok().json(patients))
}

#[instrument(skip(state, auth), fields(hospital_id = %auth.id()))]
pub async fn get(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let patient = owned_patient(&state, auth.id(), &id).await?;
    Ok(HttpResponse::Ok().json(patient))
}

#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn create(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    body: web::Json<PatientInput>,
) -> ApiResult<HttpResponse> {
    let draft = body.into_inner().into_draft()?;
    let patient = draft.into_patient(Uuid::new_v4().to_string(), auth.id(), Utc::now());
    state.db.insert_patient(&patient).await?;

    info!(id = %patient.id, code = %patient.patient_id, "patient created");
    Ok(HttpResponse::Created().json(patient))
}

#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn update(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    id: web::Path<String>,
    body: web::Json<PatientInput>,
) -> ApiResult<HttpResponse> {
    let patch = body.into_inner().into_patch()?;
    let mut patient = owned_patient(&state, auth.id(), &id).await?;

    patch.apply(&mut patient, auth.id(), Utc::now());
    state.db.update_patient(&patient).await?;
    Ok(HttpResponse::Ok().json(patient))
}

#[instrument(skip(state, auth), fields(hospital_id = %auth.id()))]
pub async fn delete(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    if !state.db.delete_patient(auth.id(), &id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }

    info!(%id, "patient deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": id })))
}

/// `id` is either the record id or the hospital-assigned patient code.
#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn set_approval(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    id: web::Path<String>,
    body: web::Json<ApprovalRequest>,
) -> ApiResult<HttpResponse> {
    let target = state
        .db
        .find_patient_by_key(auth.id(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let now = Utc::now();
    let approval = body.is_approved.then(|| Approval {
        by: auth.id().to_string(),
        at: now,
    });
    let patient = state
        .db
        .set_patient_approval(auth.id(), &target.id, approval.as_ref(), now)
        .await?;

    info!(id = %patient.id, approved = body.is_approved, "approval updated");
    Ok(HttpResponse::Ok().json(patient))
}

#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn predict(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    body: web::Json<PredictRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();

    // Resolve the target record first so a bad id never costs a model call.
    let target = match &request.patient_id {
        Some(id) => Some(owned_patient(&state, auth.id(), id).await?),
        None => None,
    };

    let risk = request_prediction(state.predictor.as_ref(), &request.file_urls).await?;

    let patient = match target {
        Some(target) => {
            let patient = state
                .db
                .set_patient_risk(auth.id(), &target.id, risk, Utc::now())
                .await?;
            info!(id = %patient.id, risk, "risk stored on record");
            Some(patient)
        }
        None => None,
    };

    Ok(HttpResponse::Ok().json(PredictionResult {
        success: true,
        readmission_risk: format_risk(risk),
        patient,
    }))
}

pub async fn predict_health(
    state: web::Data<AppState>,
    _auth: AuthenticatedHospital,
) -> ApiResult<HttpResponse> {
    let status = state
        .predictor
        .health()
        .await
        .map_err(|e| ApiError::upstream("Failed to connect to prediction service", format!("{:#}", e)))?;
    Ok(HttpResponse::Ok().json(status))
}
