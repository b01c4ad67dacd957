use std::path::Path;

use patientdesk::{
    application::{
        error::AppError,
        forms::{NoteForm, PatientForm, timestamp_now},
        list_query::ListQueryParams,
        mutations::{Mutation, MutationControl, MutationOutput},
        queries::QueryClient,
    },
    cache::CacheEntry,
    config::{ListArgs, NotesCmd, OutputFormat, PatientsCmd},
    infra::error::InfraError,
};
use serde_json::Value;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::output;

/// Everything a command handler needs, built once in `main`.
pub struct Context {
    pub queries: QueryClient,
    pub mutations: MutationControl,
    pub output: OutputFormat,
    pub page_size: u32,
}

pub async fn patients(ctx: &Context, action: PatientsCmd) -> Result<(), AppError> {
    match action {
        PatientsCmd::List(args) => {
            let params = list_params(&args, ctx.page_size);
            let page = settled(ctx.queries.patients(&params).await)?;
            output::patient_page(ctx.output, &page, &params)
        }
        PatientsCmd::Show { id } => {
            let patient = settled(ctx.queries.patient(id).await)?;
            output::patient(ctx.output, &patient)
        }
        PatientsCmd::Create { file } => {
            let form: PatientForm = serde_json::from_str(&read_form(&file)?)
                .map_err(|err| AppError::validation(format!("invalid patient form: {err}")))?;
            let payload = form.into_payload(today())?;
            let created = ctx
                .mutations
                .submit(Mutation::CreatePatient(payload))
                .await?;
            expect_patient(ctx, created)
        }
        PatientsCmd::Update { id, file } => {
            let current = settled(ctx.queries.patient(id).await)?;
            let form = merge_form(PatientForm::from_patient(&current), &read_form(&file)?)?;
            let payload = form.into_payload(today())?;
            let updated = ctx
                .mutations
                .submit(Mutation::UpdatePatient { id, payload })
                .await?;
            expect_patient(ctx, updated)
        }
        PatientsCmd::Delete { id } => {
            ctx.mutations
                .submit(Mutation::DeletePatient { id })
                .await?;
            output::deleted(ctx.output, "patient", id)
        }
    }
}

pub async fn notes(ctx: &Context, action: NotesCmd) -> Result<(), AppError> {
    match action {
        NotesCmd::List { patient_id } => {
            let notes = settled(ctx.queries.notes(patient_id).await)?;
            output::notes(ctx.output, &notes)
        }
        NotesCmd::Add {
            patient_id,
            content,
            timestamp,
        } => {
            let form = NoteForm::new(content, timestamp.unwrap_or_else(timestamp_now));
            let payload = form.into_payload()?;
            match ctx
                .mutations
                .submit(Mutation::CreateNote {
                    patient_id,
                    payload,
                })
                .await?
            {
                MutationOutput::Note(note) => output::note(ctx.output, &note),
                other => Err(unexpected_output("create_note", &other)),
            }
        }
        NotesCmd::Delete {
            patient_id,
            note_id,
        } => {
            ctx.mutations
                .submit(Mutation::DeleteNote {
                    patient_id,
                    note_id,
                })
                .await?;
            output::deleted(ctx.output, "note", note_id)
        }
    }
}

pub async fn summary(ctx: &Context, patient_id: Uuid) -> Result<(), AppError> {
    let summary = settled(ctx.queries.summary(patient_id).await)?;
    output::summary(ctx.output, &summary)
}

pub fn list_params(args: &ListArgs, default_page_size: u32) -> ListQueryParams {
    let search = args
        .search
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let limit = ListQueryParams::clamp_limit(args.limit.unwrap_or(default_page_size));

    ListQueryParams {
        search,
        status: args.status,
        sort_by: args.sort_by.unwrap_or_default(),
        sort_order: args.sort_order.unwrap_or_default(),
        limit,
        offset: args.page.saturating_mul(limit),
    }
}

/// Unwrap a finished cache entry.
pub fn settled<T>(entry: CacheEntry<T>) -> Result<T, AppError> {
    match entry.into_result() {
        Some(result) => result.map_err(AppError::from),
        None => Err(AppError::unexpected("query finished without a result")),
    }
}

fn read_form(path: &Path) -> Result<String, AppError> {
    debug!(path = %path.display(), "Reading patient form");
    std::fs::read_to_string(path).map_err(|err| AppError::from(InfraError::from(err)))
}

/// Overlay the fields present in `json` on top of `base`.
fn merge_form(base: PatientForm, json: &str) -> Result<PatientForm, AppError> {
    let invalid = |err: serde_json::Error| AppError::validation(format!("invalid patient form: {err}"));

    let Value::Object(changes) = serde_json::from_str::<Value>(json).map_err(invalid)? else {
        return Err(AppError::validation("patient form must be a JSON object"));
    };
    let mut merged = serde_json::to_value(base).map_err(invalid)?;
    if let Value::Object(fields) = &mut merged {
        fields.extend(changes);
    }
    serde_json::from_value(merged).map_err(invalid)
}

fn expect_patient(ctx: &Context, output: MutationOutput) -> Result<(), AppError> {
    match output {
        MutationOutput::Patient(patient) => {
            info!(patient_id = %patient.id, "Patient saved");
            output::patient(ctx.output, &patient)
        }
        other => Err(unexpected_output("patient", &other)),
    }
}

fn unexpected_output(op: &str, output: &MutationOutput) -> AppError {
    AppError::unexpected(format!("{op} returned an unexpected result: {output:?}"))
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
