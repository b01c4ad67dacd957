#![deny(clippy::all, clippy::pedantic)]

use assert_cmd::Command;
use httpmock::MockServer;
use predicates::str::contains;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const PATIENT_ID: &str = "3a7e0f5c-9b2d-4e1f-8a6b-5c4d3e2f1a0b";
const NOTE_ID: &str = "9d8c7b6a-5f4e-4d3c-b2a1-0f9e8d7c6b5a";

fn form_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write form");
    file
}

fn patient_json(first: &str, last: &str) -> String {
    format!(
        r#"{{"id":"{PATIENT_ID}","first_name":"{first}","last_name":"{last}","date_of_birth":"1990-05-17",
        "gender":"female","email":"jane@example.com","phone":"555-0101","address":"2 Elm St",
        "blood_type":"O+","allergies":["latex"],"conditions":["asthma"],"status":"active",
        "last_visit_date":"2025-02-01","created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}}"#
    )
}

fn patientdesk(server: &MockServer) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("patientdesk"));
    cmd.env_remove("PATIENTDESK_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .arg("--api-base-url")
        .arg(server.url("/api/"));
    cmd
}

#[test]
fn patients_list_prints_rows_and_page_footer() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/api/patients")
            .query_param("limit", "5")
            .query_param("offset", "5")
            .query_param("status", "active")
            .query_param("sort_by", "last_name")
            .query_param("sort_order", "asc");
        then.status(200)
            .header("content-type", "application/json")
            .body(format!(
                r#"{{"items":[{}],"total":12,"limit":5,"offset":5}}"#,
                patient_json("Jane", "Doe")
            ));
    });

    patientdesk(&server)
        .args(["patients", "list", "--status", "active", "--limit", "5", "--page", "1"])
        .assert()
        .success()
        .stdout(contains("Doe, Jane"))
        .stdout(contains("May 17, 1990"))
        .stdout(contains("Page 2 of 3 (12 patients)"));
    mock.assert();
}

#[test]
fn missing_patient_fails_with_server_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path(format!("/api/patients/{PATIENT_ID}"));
        then.status(404)
            .header("content-type", "application/json")
            .body(r#"{"detail":"Patient not found"}"#);
    });

    patientdesk(&server)
        .args(["patients", "show", PATIENT_ID])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: Patient not found"));
}

#[test]
fn create_posts_normalized_form_and_prints_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/api/patients").json_body(json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "date_of_birth": "1990-05-17",
            "gender": "female",
            "email": "jane@example.com",
            "phone": "555-0101",
            "address": "2 Elm St",
            "blood_type": "O+",
            "allergies": ["latex"],
            "conditions": ["asthma"],
            "status": "active",
            "last_visit_date": null
        }));
        then.status(201)
            .header("content-type", "application/json")
            .body(patient_json("Jane", "Doe"));
    });

    let form = form_file(
        r#"{"first_name":" Jane ","last_name":"Doe","date_of_birth":"1990-05-17","gender":"female",
        "email":"jane@example.com","phone":"555-0101","address":"2 Elm St","blood_type":"O+",
        "allergies":"latex, ","conditions":["asthma"]}"#,
    );

    patientdesk(&server)
        .args(["--output", "json", "patients", "create", "--file"])
        .arg(form.path())
        .assert()
        .success()
        .stdout(contains(format!("\"id\": \"{PATIENT_ID}\"")));
    mock.assert();
}

#[test]
fn invalid_form_is_rejected_before_any_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/api/patients");
        then.status(201);
    });

    let form = form_file(
        r#"{"first_name":"Jane","last_name":"Doe","date_of_birth":"1990-05-17","gender":"female",
        "email":"not-an-email","phone":"555","address":"x"}"#,
    );

    patientdesk(&server)
        .args(["patients", "create", "--file"])
        .arg(form.path())
        .assert()
        .failure()
        .stderr(contains("email: Invalid email format"));
    assert_eq!(mock.hits(), 0);
}

#[test]
fn notes_add_sends_utc_timestamp() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path(format!("/api/patients/{PATIENT_ID}/notes"))
            .json_body(json!({
                "content": "BP normal",
                "timestamp": "2025-03-04T10:30:00Z"
            }));
        then.status(201)
            .header("content-type", "application/json")
            .body(format!(
                r#"{{"id":"{NOTE_ID}","patient_id":"{PATIENT_ID}","content":"BP normal","timestamp":"2025-03-04T10:30:00Z","created_at":"2025-03-04T10:30:01Z"}}"#
            ));
    });

    patientdesk(&server)
        .args([
            "notes",
            "add",
            PATIENT_ID,
            "--content",
            " BP normal ",
            "--timestamp",
            "2025-03-04T10:30",
        ])
        .assert()
        .success()
        .stdout(contains("BP normal"));
    mock.assert();
}

#[test]
fn notes_delete_reports_deleted_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE")
            .path(format!("/api/patients/{PATIENT_ID}/notes/{NOTE_ID}"));
        then.status(204);
    });

    patientdesk(&server)
        .args(["notes", "delete", PATIENT_ID, NOTE_ID])
        .assert()
        .success()
        .stdout(contains(format!("Deleted note {NOTE_ID}")));
    mock.assert();
}

#[test]
fn summary_prints_json() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET")
            .path(format!("/api/patients/{PATIENT_ID}/summary"));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"summary":"Jane Doe, 35, has asthma.","mode":"template"}"#);
    });

    patientdesk(&server)
        .args(["--output", "json", "summary", PATIENT_ID])
        .assert()
        .success()
        .stdout(contains("\"mode\": \"template\""));
}

#[test]
fn browse_commits_search_typed_before_eof() {
    let server = MockServer::start();
    let searched = server.mock(|when, then| {
        when.method("GET")
            .path("/api/patients")
            .query_param("search", "jane");
        then.status(200)
            .header("content-type", "application/json")
            .body(format!(
                r#"{{"items":[{}],"total":1,"limit":20,"offset":0}}"#,
                patient_json("Jane", "Doe")
            ));
    });
    server.mock(|when, then| {
        when.method("GET").path("/api/patients");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"items":[],"total":0,"limit":20,"offset":0}"#);
    });

    patientdesk(&server)
        .args(["browse", "--debounce-ms", "20"])
        .write_stdin("search j\nsearch ja\nsearch jane\n")
        .assert()
        .success()
        .stdout(contains("No patients found"))
        .stdout(contains("Doe, Jane"));
    searched.assert();
}

#[test]
fn invalid_base_url_fails_fast() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("patientdesk"));
    cmd.env_remove("PATIENTDESK_CONFIG_FILE")
        .args(["--api-base-url", "ftp://example.com/", "summary", PATIENT_ID])
        .assert()
        .failure()
        .stderr(contains("api.base_url"));
}
