use std::time::Duration;

use httpmock::MockServer;
use patientdesk::application::error::ApiError;
use patientdesk::application::list_query::ListQueryParams;
use patientdesk::application::repos::PatientGateway;
use patientdesk::config::ApiSettings;
use patientdesk::infra::api::ApiClient;
use patientdesk_api_types::{
    NotePayload, PatientPayload, PatientStatus, SortColumn, SortOrder, SummaryMode,
};
use time::macros::date;
use url::Url;
use uuid::Uuid;

const PATIENT_ID: &str = "6f1c2d3e-4a5b-4c6d-8e9f-0a1b2c3d4e5f";

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiSettings {
        base_url: Url::parse(&server.url("/api/")).expect("base url"),
        timeout: Duration::from_secs(2),
    })
    .expect("client")
}

fn patient_json(id: &str, first: &str, last: &str) -> String {
    format!(
        r#"{{"id":"{id}","first_name":"{first}","last_name":"{last}","date_of_birth":"1980-02-29",
        "gender":"female","email":"{first}@example.com","phone":"555-0100","address":"1 Main St",
        "blood_type":"AB+","allergies":["latex"],"conditions":[],"status":"active",
        "last_visit_date":null,"created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}}"#
    )
}

fn payload() -> PatientPayload {
    PatientPayload {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        date_of_birth: date!(1815 - 12 - 10),
        gender: "female".into(),
        email: "ada@example.com".into(),
        phone: "555-0100".into(),
        address: "London".into(),
        blood_type: None,
        allergies: vec![],
        conditions: vec![],
        status: PatientStatus::Active,
        last_visit_date: None,
    }
}

#[tokio::test]
async fn list_sends_only_meaningful_query_params() {
    let server = MockServer::start_async().await;
    let body = format!(
        r#"{{"items":[{}],"total":41,"limit":20,"offset":20}}"#,
        patient_json(PATIENT_ID, "Jane", "Doe")
    );
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/patients")
                .query_param("limit", "20")
                .query_param("offset", "20")
                .query_param("search", "jane")
                .query_param("status", "critical")
                .query_param("sort_by", "date_of_birth")
                .query_param("sort_order", "desc")
                .header("user-agent", ApiClient::user_agent());
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
        .await;

    let params = ListQueryParams {
        search: Some("jane".into()),
        status: Some(PatientStatus::Critical),
        sort_by: SortColumn::DateOfBirth,
        sort_order: SortOrder::Desc,
        limit: 20,
        offset: 20,
    };
    let page = client(&server)
        .list_patients(&params)
        .await
        .expect("page loads");

    mock.assert_async().await;
    assert_eq!(page.total, 41);
    assert_eq!(page.items[0].last_name, "Doe");
    assert_eq!(page.items[0].date_of_birth, date!(1980 - 02 - 29));
}

#[test]
fn blank_search_and_absent_status_are_not_sent() {
    let pairs = ListQueryParams {
        search: Some(String::new()),
        ..ListQueryParams::default()
    }
    .to_query_pairs();
    let names: Vec<&str> = pairs.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["sort_by", "sort_order", "limit", "offset"]);
}

#[tokio::test]
async fn missing_patient_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path(format!("/api/patients/{PATIENT_ID}"));
            then.status(404)
                .header("content-type", "application/json")
                .body(r#"{"detail":"Patient not found"}"#);
        })
        .await;

    let err = client(&server)
        .get_patient(PATIENT_ID.parse().expect("uuid"))
        .await
        .expect_err("missing");
    assert_eq!(err, ApiError::not_found("Patient not found"));
}

#[tokio::test]
async fn unprocessable_record_read_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path(format!("/api/patients/{PATIENT_ID}/summary"));
            then.status(422)
                .header("content-type", "application/json")
                .body(r#"{"detail":[{"loc":["path","patient_id"],"msg":"Input should be a valid UUID"}]}"#);
        })
        .await;

    let err = client(&server)
        .get_summary(PATIENT_ID.parse().expect("uuid"))
        .await
        .expect_err("rejected");
    assert!(matches!(err, ApiError::NotFound { .. }));
}

#[tokio::test]
async fn create_validation_errors_are_joined() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/api/patients")
                .header("content-type", "application/json");
            then.status(422)
                .header("content-type", "application/json")
                .body(r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address"},{"loc":["body","phone"],"msg":"too long"}]}"#);
        })
        .await;

    let err = client(&server)
        .create_patient(&payload())
        .await
        .expect_err("invalid");
    mock.assert_async().await;
    assert_eq!(
        err.user_message(),
        "email: value is not a valid email address; phone: too long"
    );
    assert!(matches!(err, ApiError::Validation { .. }));
}

#[tokio::test]
async fn update_uses_put_and_decodes_patient() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("PUT").path(format!("/api/patients/{PATIENT_ID}"));
            then.status(200)
                .header("content-type", "application/json")
                .body(patient_json(PATIENT_ID, "Ada", "Lovelace"));
        })
        .await;

    let patient = client(&server)
        .update_patient(PATIENT_ID.parse().expect("uuid"), &payload())
        .await
        .expect("updated");
    mock.assert_async().await;
    assert_eq!(patient.full_name(), "Ada Lovelace");
}

#[tokio::test]
async fn deletes_accept_empty_no_content() {
    let server = MockServer::start_async().await;
    let note_id = Uuid::new_v4();
    let patient = server
        .mock_async(|when, then| {
            when.method("DELETE").path(format!("/api/patients/{PATIENT_ID}"));
            then.status(204);
        })
        .await;
    let note = server
        .mock_async(|when, then| {
            when.method("DELETE")
                .path(format!("/api/patients/{PATIENT_ID}/notes/{note_id}"));
            then.status(204);
        })
        .await;

    let api = client(&server);
    let id: Uuid = PATIENT_ID.parse().expect("uuid");
    api.delete_note(id, note_id).await.expect("note deleted");
    api.delete_patient(id).await.expect("patient deleted");
    patient.assert_async().await;
    note.assert_async().await;
}

#[tokio::test]
async fn notes_and_summary_decode() {
    let server = MockServer::start_async().await;
    let note_id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path(format!("/api/patients/{PATIENT_ID}/notes"));
            then.status(201)
                .header("content-type", "application/json")
                .body(format!(
                    r#"{{"id":"{note_id}","patient_id":"{PATIENT_ID}","content":"BP normal","timestamp":"2025-03-04T10:00:00Z","created_at":"2025-03-04T10:00:01Z"}}"#
                ));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path(format!("/api/patients/{PATIENT_ID}/summary"));
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"summary":"Jane Doe is a 45-year-old patient.","mode":"template"}"#);
        })
        .await;

    let api = client(&server);
    let id: Uuid = PATIENT_ID.parse().expect("uuid");
    let note = api
        .create_note(
            id,
            &NotePayload {
                content: "BP normal".into(),
                timestamp: "2025-03-04T10:00:00Z".into(),
            },
        )
        .await
        .expect("note created");
    assert_eq!(note.id, note_id);

    let summary = api.get_summary(id).await.expect("summary");
    assert_eq!(summary.mode, SummaryMode::Template);
}

#[tokio::test]
async fn server_errors_without_envelope_use_fallback_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/patients");
            then.status(502).body("bad gateway");
        })
        .await;

    let err = client(&server)
        .list_patients(&ListQueryParams::default())
        .await
        .expect_err("failed");
    assert_eq!(err.status(), Some(502));
    assert!(err.is_transient());
    assert_eq!(
        err.user_message(),
        "An unexpected error occurred. Please try again."
    );
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let api = ApiClient::new(&ApiSettings {
        base_url: Url::parse("http://127.0.0.1:9/api/").expect("url"),
        timeout: Duration::from_millis(500),
    })
    .expect("client");

    let err = api
        .list_patients(&ListQueryParams::default())
        .await
        .expect_err("unreachable");
    assert!(matches!(err, ApiError::Network { .. }));
}
