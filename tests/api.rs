mod common;

use std::rc::Rc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{bearer, call_json, intake, register_request, state, UNREACHABLE};
use readmit::api;

macro_rules! app {
    ($prediction:expr, $generator:expr) => {
        test::init_service(
            App::new()
                .app_data(state($prediction, $generator).await)
                .configure(api::configure),
        )
        .await
    };
}

fn token_of(body: &Value) -> String {
    body["token"].as_str().expect("token in body").to_string()
}

#[actix_web::test]
async fn health_reports_ok() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (status, body) = call_json(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[actix_web::test]
async fn register_login_verify() {
    let app = app!(UNREACHABLE, UNREACHABLE);

    let (status, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["hospitalInfo"]["physicianName"], "Dr. Grey");
    assert!(body["hospitalInfo"].get("passwordHash").is_none());

    let login = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "Admin@Acme.org", "password": "s3cret!" }))
        .to_request();
    let (status, body) = call_json(&app, login).await;
    assert_eq!(status, StatusCode::OK);
    let token = token_of(&body);

    let verify = test::TestRequest::get()
        .uri("/api/auth/verify")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = call_json(&app, verify).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["hospital"]["email"], "admin@acme.org");
}

#[actix_web::test]
async fn bad_credentials_and_duplicate_email() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    call_json(&app, register_request("admin@acme.org").to_request()).await;

    let (status, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Hospital with this email already exists");

    for (email, password) in [("admin@acme.org", "wrong!!"), ("nobody@acme.org", "s3cret!")] {
        let login = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request();
        let (status, body) = call_json(&app, login).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[actix_web::test]
async fn registration_is_validated() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let request = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "name": "  ",
            "email": "not-an-email",
            "password": "123",
            "department": "ER",
            "physicianName": "Dr. X"
        }))
        .to_request();

    let (status, body) = call_json(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Hospital name is required"));
    assert!(message.contains("Password must be at least 6 characters"));
}

#[actix_web::test]
async fn altered_or_missing_token_is_unauthorized() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let (head, _) = token.rsplit_once('.').unwrap();
    let forged = format!("{}.c2lnbmF0dXJl", head);

    for header in [Some(bearer(&forged)), Some(("Authorization", token.clone())), None] {
        let mut request = test::TestRequest::get().uri("/api/patients");
        if let Some(header) = header {
            request = request.insert_header(header);
        }
        let (status, body) = call_json(&app, request.to_request()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized to access this resource");
    }
}

#[actix_web::test]
async fn prediction_completes_an_assessment() {
    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_json(json!({ "documentUrl": "https://files.example/discharge.pdf" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "readmissionRisk": "62.50" })))
        .expect(1)
        .mount(&model)
        .await;

    let app = app!(&model.uri(), UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let create = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .set_json(intake("PT-1001"))
        .to_request();
    let (status, patient) = call_json(&app, create).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(patient["readmissionRisk"], Value::Null);
    assert_eq!(patient["isApproved"], false);
    let id = patient["id"].as_str().unwrap().to_string();

    let stats = || {
        test::TestRequest::get()
            .uri("/api/stats/weekly")
            .insert_header(bearer(&token))
            .to_request()
    };
    let (_, before) = call_json(&app, stats()).await;
    assert_eq!(before["currentWeek"]["totalPatients"], 1);
    assert_eq!(before["currentWeek"]["pendingAssessments"], 1);
    assert_eq!(before["trendData"].as_array().unwrap().len(), 4);

    let predict = test::TestRequest::post()
        .uri("/api/patients/predict")
        .insert_header(bearer(&token))
        .set_json(json!({ "fileUrls": ["https://files.example/discharge.pdf"], "patientId": id }))
        .to_request();
    let (status, result) = call_json(&app, predict).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["readmissionRisk"], "62.50");
    assert_eq!(result["patient"]["readmissionRisk"], 62.5);

    let (_, after) = call_json(&app, stats()).await;
    assert_eq!(after["currentWeek"]["pendingAssessments"], 0);
    assert_eq!(after["currentWeek"]["highRiskPatients"], 1);
    assert_eq!(after["currentWeek"]["averageReadmissionRisk"], 62.5);
}

#[actix_web::test]
async fn prediction_failures() {
    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&model)
        .await;

    let app = app!(&model.uri(), UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let empty = test::TestRequest::post()
        .uri("/api/patients/predict")
        .insert_header(bearer(&token))
        .set_json(json!({ "fileUrls": [] }))
        .to_request();
    let (status, body) = call_json(&app, empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file URLs provided");

    let failing = test::TestRequest::post()
        .uri("/api/patients/predict")
        .insert_header(bearer(&token))
        .set_json(json!({ "fileUrls": ["https://files.example/a.pdf"] }))
        .to_request();
    let (status, body) = call_json(&app, failing).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to get prediction");
    assert_eq!(body["success"], false);
    assert!(body.get("error").is_none());

    let health = test::TestRequest::get()
        .uri("/api/patients/predict/health")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = call_json(&app, health).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to connect to prediction service");
}

#[actix_web::test]
async fn patient_crud_is_scoped_to_the_hospital() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (_, a) = call_json(&app, register_request("a@acme.org").to_request()).await;
    let (_, b) = call_json(&app, register_request("b@acme.org").to_request()).await;
    let (a, b) = (token_of(&a), token_of(&b));

    let create = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&a))
        .set_json(intake("PT-1"))
        .to_request();
    let (_, patient) = call_json(&app, create).await;
    let uri = format!("/api/patients/{}", patient["id"].as_str().unwrap());

    // the same code is free in another hospital
    let other = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&b))
        .set_json(intake("PT-1"))
        .to_request();
    assert_eq!(call_json(&app, other).await.0, StatusCode::CREATED);

    let duplicate = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&a))
        .set_json(intake("PT-1"))
        .to_request();
    let (status, body) = call_json(&app, duplicate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Patient with this ID already exists");

    let foreign = test::TestRequest::get().uri(&uri).insert_header(bearer(&b)).to_request();
    assert_eq!(call_json(&app, foreign).await.0, StatusCode::NOT_FOUND);

    let list = test::TestRequest::get().uri("/api/patients").insert_header(bearer(&b)).to_request();
    let (_, records) = call_json(&app, list).await;
    assert_eq!(records.as_array().unwrap().len(), 1);

    let update = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&a))
        .set_json(json!({ "age": "70", "readmissionRisk": "41.5%" }))
        .to_request();
    let (status, updated) = call_json(&app, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["age"], 70);
    assert_eq!(updated["readmissionRisk"], 41.5);

    let clear = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&a))
        .set_json(json!({ "readmissionRisk": null }))
        .to_request();
    let (_, cleared) = call_json(&app, clear).await;
    assert_eq!(cleared["readmissionRisk"], Value::Null);
    assert_eq!(cleared["age"], 70);

    let foreign_delete = test::TestRequest::delete().uri(&uri).insert_header(bearer(&b)).to_request();
    assert_eq!(call_json(&app, foreign_delete).await.0, StatusCode::NOT_FOUND);

    let delete = || test::TestRequest::delete().uri(&uri).insert_header(bearer(&a)).to_request();
    let (status, body) = call_json(&app, delete()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], patient["id"]);

    let (status, body) = call_json(&app, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Patient not found");
}

#[actix_web::test]
async fn create_reports_missing_and_malformed_fields() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let missing = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .set_json(json!({ "patientId": "PT-9", "firstName": "Ada" }))
        .to_request();
    let (status, body) = call_json(&app, missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Please add a last name"));

    let mut malformed = intake("PT-9");
    malformed["age"] = json!("sixty");
    let request = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .set_json(malformed)
        .to_request();
    assert_eq!(call_json(&app, request).await.0, StatusCode::BAD_REQUEST);

    let not_json = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{oops")
        .to_request();
    let (status, body) = call_json(&app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn approval_moves_flag_approver_and_time_together() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);
    let hospital_id = body["hospitalInfo"]["id"].clone();

    let create = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .set_json(intake("PT-1001"))
        .to_request();
    call_json(&app, create).await;

    let approve = |approved: bool| {
        test::TestRequest::patch()
            .uri("/api/patients/PT-1001/approval")
            .insert_header(bearer(&token))
            .set_json(json!({ "isApproved": approved }))
            .to_request()
    };

    let (status, approved) = call_json(&app, approve(true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["isApproved"], true);
    assert_eq!(approved["approvedBy"], hospital_id);
    assert!(approved["approvedAt"].is_string());

    let (_, revoked) = call_json(&app, approve(false)).await;
    assert_eq!(revoked["isApproved"], false);
    assert_eq!(revoked["approvedBy"], Value::Null);
    assert_eq!(revoked["approvedAt"], Value::Null);

    let unknown = test::TestRequest::patch()
        .uri("/api/patients/PT-404/approval")
        .insert_header(bearer(&token))
        .set_json(json!({ "isApproved": true }))
        .to_request();
    assert_eq!(call_json(&app, unknown).await.0, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn profile_update_and_me() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    call_json(&app, register_request("taken@acme.org").to_request()).await;
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let update = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "city": "Springfield", "beds": "250", "type": "Teaching" }))
        .to_request();
    let (status, body) = call_json(&app, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hospitalInfo"]["city"], "Springfield");

    let clash = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "email": "taken@acme.org" }))
        .to_request();
    assert_eq!(call_json(&app, clash).await.0, StatusCode::BAD_REQUEST);

    let me = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let (_, body) = call_json(&app, me).await;
    assert_eq!(body["data"]["type"], "Teaching");
    assert_eq!(body["data"]["email"], "admin@acme.org");
}

#[actix_web::test]
async fn profile_fields_are_trimmed_before_validation() {
    let app = app!(UNREACHABLE, UNREACHABLE);
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let profile = |payload: Value| {
        test::TestRequest::put()
            .uri("/api/auth/profile")
            .insert_header(bearer(&token))
            .set_json(payload)
            .to_request()
    };

    let (status, body) = call_json(&app, profile(json!({ "name": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call_json(&app, profile(json!({ "email": " Billing@Acme.org " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hospitalInfo"]["email"], "billing@acme.org");
    assert_eq!(body["hospitalInfo"]["name"], "Acme General");
}

#[actix_web::test]
async fn recommendations_use_the_generator_or_fall_back() {
    let generator = MockServer::start().await;
    let reply = "```json\n{\"recommendations\": [{\"text\": \"Follow up within 7 days.\", \"category\": \"Follow-up\"}]}\n```";
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": reply })))
        .up_to_n_times(1)
        .mount(&generator)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&generator)
        .await;

    let app = app!(UNREACHABLE, &format!("{}/generate", generator.uri()));
    let (_, body) = call_json(&app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let recommend = |payload: Value| {
        test::TestRequest::post()
            .uri("/api/recommendations")
            .insert_header(bearer(&token))
            .set_json(payload)
            .to_request()
    };

    let (status, body) = call_json(&app, recommend(json!({ "riskValue": "62.50" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["source"], "ai-generated");
    assert_eq!(body["metadata"]["riskCategory"], "high");
    assert_eq!(body["recommendations"][0]["category"], "Follow-up");

    let (status, body) = call_json(&app, recommend(json!({ "riskCategory": "low" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["source"], "fallback");
    assert_eq!(body["metadata"]["riskValue"], Value::Null);
    assert!(!body["recommendations"].as_array().unwrap().is_empty());

    let (status, body) = call_json(&app, recommend(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Risk category is required");
}

#[actix_web::test]
async fn approval_during_a_slow_prediction_is_kept() {
    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "readmissionRisk": 62.5 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&model)
        .await;

    let app = Rc::new(app!(&model.uri(), UNREACHABLE));
    let (_, body) = call_json(&*app, register_request("admin@acme.org").to_request()).await;
    let token = token_of(&body);

    let create = test::TestRequest::post()
        .uri("/api/patients")
        .insert_header(bearer(&token))
        .set_json(intake("PT-1001"))
        .to_request();
    let (_, patient) = call_json(&*app, create).await;
    let id = patient["id"].as_str().unwrap().to_string();

    let predict = test::TestRequest::post()
        .uri("/api/patients/predict")
        .insert_header(bearer(&token))
        .set_json(json!({ "fileUrls": ["https://files.example/discharge.pdf"], "patientId": id }))
        .to_request();
    let in_flight = actix_web::rt::spawn({
        let app = Rc::clone(&app);
        async move { call_json(&*app, predict).await }
    });

    actix_web::rt::time::sleep(Duration::from_millis(100)).await;
    let approve = test::TestRequest::patch()
        .uri("/api/patients/PT-1001/approval")
        .insert_header(bearer(&token))
        .set_json(json!({ "isApproved": true }))
        .to_request();
    let (status, approved) = call_json(&*app, approve).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["isApproved"], true);

    let (status, result) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["patient"]["isApproved"], true);

    let get = test::TestRequest::get()
        .uri(&format!("/api/patients/{}", id))
        .insert_header(bearer(&token))
        .to_request();
    let (_, stored) = call_json(&*app, get).await;
    assert_eq!(stored["isApproved"], true);
    assert_eq!(stored["approvedBy"], approved["approvedBy"]);
    assert_eq!(stored["readmissionRisk"], 62.5);
}
