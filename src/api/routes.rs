use actix_web::{error::JsonPayloadError, web, HttpRequest};

use super::handlers::{auth, health, patients, recommendations, stats};
use crate::error::ApiError;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::validation(format!("Invalid request body: {}", err)).into()
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/health", web::get().to(health::health))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/verify", web::get().to(auth::verify))
                        .route("/me", web::get().to(auth::me))
                        .route("/profile", web::put().to(auth::update_profile)),
                )
                .service(
                    web::scope("/patients")
                        .route("/predict", web::post().to(patients::predict))
                        .route("/predict/health", web::get().to(patients::predict_health))
                        .route("", web::get().to(patients::list))
                        .route("", web::post().to(patients::create))
                        .route("/{id}", web::get().to(patients::get))
                        .route("/{id}", web::put().to(patients::update))
                        .route("/{id}", web::delete().to(patients::delete))
                        .route("/{id}/approval", web::patch().to(patients::set_approval)),
                )
                .route("/stats/weekly", web::get().to(stats::weekly))
                .route("/recommendations", web::post().to(recommendations::recommend)),
        );
}
