//! Text and JSON rendering of command results on stdout.

use std::fmt::Write as _;

use patientdesk::{
    application::{error::AppError, list_query::ListQueryParams},
    config::OutputFormat,
};
use patientdesk_api_types::{Note, Patient, PatientPage, PatientSummary, SummaryMode};
use serde::Serialize;
use serde_json::json;
use time::{Date, macros::format_description};
use uuid::Uuid;

const MISSING: &str = "-";

pub fn patient_page(
    format: OutputFormat,
    page: &PatientPage,
    params: &ListQueryParams,
) -> Result<(), AppError> {
    emit(format, page, || render_page(page, params))
}

pub fn patient(format: OutputFormat, patient: &Patient) -> Result<(), AppError> {
    emit(format, patient, || render_patient(patient))
}

pub fn notes(format: OutputFormat, notes: &[Note]) -> Result<(), AppError> {
    emit(format, notes, || render_notes(notes))
}

pub fn note(format: OutputFormat, note: &Note) -> Result<(), AppError> {
    emit(format, note, || render_note(note))
}

pub fn summary(format: OutputFormat, summary: &PatientSummary) -> Result<(), AppError> {
    emit(format, summary, || render_summary(summary))
}

pub fn deleted(format: OutputFormat, kind: &str, id: Uuid) -> Result<(), AppError> {
    let value = json!({ "deleted": kind, "id": id });
    emit(format, &value, || format!("Deleted {kind} {id}\n"))
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), AppError> {
    let rendered = match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value)
                .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
            json.push('\n');
            json
        }
        OutputFormat::Text => text(),
    };
    print!("{rendered}");
    Ok(())
}

pub fn render_page(page: &PatientPage, params: &ListQueryParams) -> String {
    if page.items.is_empty() {
        let filtered = params.search.is_some() || params.status.is_some();
        return if filtered {
            "No patients match your search\n".to_string()
        } else {
            "No patients found\n".to_string()
        };
    }

    let mut out = String::new();
    for patient in &page.items {
        let _ = writeln!(
            out,
            "{}  {:<28}  {:<12}  {:<8}  {}",
            patient.id,
            format!("{}, {}", patient.last_name, patient.first_name),
            display_date(patient.date_of_birth),
            patient.status.as_str(),
            patient
                .last_visit_date
                .as_deref()
                .map(display_date_text)
                .unwrap_or_else(|| MISSING.to_string()),
        );
    }

    let pages = params.page_count(page.total).max(1);
    let _ = writeln!(
        out,
        "Page {} of {} ({} patients)",
        params.page_index() + 1,
        pages,
        page.total
    );
    out
}

pub fn render_patient(patient: &Patient) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", patient.full_name(), patient.id);
    let rows = [
        ("Status", patient.status.to_string()),
        ("Date of birth", display_date(patient.date_of_birth)),
        ("Gender", patient.gender.clone()),
        ("Email", patient.email.clone()),
        ("Phone", patient.phone.clone()),
        ("Address", patient.address.clone()),
        (
            "Blood type",
            patient
                .blood_type
                .map(|blood| blood.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
        ),
        ("Allergies", join_or_missing(&patient.allergies)),
        ("Conditions", join_or_missing(&patient.conditions)),
        (
            "Last visit",
            patient
                .last_visit_date
                .as_deref()
                .map(display_date_text)
                .unwrap_or_else(|| MISSING.to_string()),
        ),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<14}{value}");
    }
    out
}

pub fn render_notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes yet\n".to_string();
    }
    notes.iter().map(render_note).collect()
}

pub fn render_note(note: &Note) -> String {
    format!("[{}] {}  ({})\n", note.timestamp, note.content, note.id)
}

pub fn render_summary(summary: &PatientSummary) -> String {
    let mode = match summary.mode {
        SummaryMode::Llm => "llm",
        SummaryMode::Template => "template",
    };
    format!("{}\n(mode: {mode})\n", summary.summary)
}

fn join_or_missing(items: &[String]) -> String {
    if items.is_empty() {
        MISSING.to_string()
    } else {
        items.join(", ")
    }
}

fn display_date(date: Date) -> String {
    date.format(format_description!(
        "[month repr:short] [day padding:none], [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}

/// Dates from the server arrive as text; anything that does not start with
/// `YYYY-MM-DD` is shown as missing.
fn display_date_text(raw: &str) -> String {
    raw.get(..10)
        .and_then(|prefix| {
            Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok()
        })
        .map(display_date)
        .unwrap_or_else(|| MISSING.to_string())
}
