#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use serde_json::{json, Value};

use readmit::api::AppState;
use readmit::config::{
    AuthConfig, Config, DatabaseConfig, Environment, ServerConfig, ServicesConfig, StatsConfig,
};
use readmit::db::Database;

/// Nothing listens here; requests to it fail fast.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub fn config(prediction_url: &str, generator_url: &str) -> Config {
    Config {
        environment: Environment::Development,
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: "*".into(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: "integration-secret".into(),
            token_ttl_days: 30,
        },
        services: ServicesConfig {
            prediction_url: prediction_url.into(),
            generator_url: generator_url.into(),
            generator_api_key: None,
            timeout_secs: 2,
        },
        stats: StatsConfig {
            utc_offset_minutes: 0,
        },
    }
}

pub async fn state(prediction_url: &str, generator_url: &str) -> web::Data<AppState> {
    let db = Database::in_memory().await.expect("in-memory database");
    let state = AppState::from_config(db, &config(prediction_url, generator_url)).expect("app state");
    web::Data::new(state)
}

/// Sends `req` and returns the status with the JSON body (`Null` when empty).
pub async fn call_json<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, req).await;
    let status = response.status();
    let bytes = test::read_body(response).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

pub fn registration(email: &str) -> Value {
    json!({
        "name": "Acme General",
        "email": email,
        "password": "s3cret!",
        "department": "Cardiology",
        "physicianName": "Dr. Grey"
    })
}

pub fn register_request(email: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(registration(email))
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn intake(patient_id: &str) -> Value {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    json!({
        "patientId": patient_id,
        "firstName": first,
        "lastName": last,
        "age": 67,
        "gender": "female",
        "primaryDiagnosis": "Congestive heart failure",
        "lengthOfStay": 10,
        "fileUrls": ["https://files.example/discharge.pdf"]
    })
}
