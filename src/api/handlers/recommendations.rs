use actix_web::{web, HttpResponse};
use tracing::instrument;

use crate::api::{AppState, AuthenticatedHospital};
use crate::core::ai::resolve_risk;
use crate::error::ApiResult;
use crate::models::recommendation::RecommendationRequest;

#[instrument(skip(state, auth, body), fields(hospital_id = %auth.id()))]
pub async fn recommend(
    state: web::Data<AppState>,
    auth: AuthenticatedHospital,
    body: web::Json<RecommendationRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    let (category, value) = resolve_risk(&request)?;

    let response = state
        .ai
        .recommend(category, value, request.patient_data.as_ref())
        .await;
    Ok(HttpResponse::Ok().json(response))
}
