use actix_web::{web, HttpResponse};
use chrono::Utc;
use tracing::instrument;

use crate::api::{AppState, AuthenticatedHospital};
use crate::core::stats::weekly_stats;
use crate::error::ApiResult;

#[instrument(skip(state, auth), fields(hospital_id = %auth.id()))]
pub async fn weekly(state: web::Data<AppState>, auth: AuthenticatedHospital) -> ApiResult<HttpResponse> {
    let patients = state.db.list_patients(auth.id()).await?;
    let stats = weekly_stats(&patients, Utc::now(), state.utc_offset);
    Ok(HttpResponse::Ok().json(stats))
}
