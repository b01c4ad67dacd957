//! Gateway trait describing the patient records backend.

use async_trait::async_trait;
use patientdesk_api_types::{
    Note, NotePayload, Patient, PatientPage, PatientPayload, PatientSummary,
};
use uuid::Uuid;

use crate::application::error::ApiError;
use crate::application::list_query::ListQueryParams;

/// One method per backend operation. Implemented over HTTP by
/// [`crate::infra::api::ApiClient`] and by in-memory fakes in tests.
#[async_trait]
pub trait PatientGateway: Send + Sync {
    async fn list_patients(&self, params: &ListQueryParams) -> Result<PatientPage, ApiError>;

    async fn get_patient(&self, id: Uuid) -> Result<Patient, ApiError>;

    async fn create_patient(&self, payload: &PatientPayload) -> Result<Patient, ApiError>;

    async fn update_patient(&self, id: Uuid, payload: &PatientPayload)
    -> Result<Patient, ApiError>;

    async fn delete_patient(&self, id: Uuid) -> Result<(), ApiError>;

    async fn list_notes(&self, patient_id: Uuid) -> Result<Vec<Note>, ApiError>;

    async fn create_note(&self, patient_id: Uuid, payload: &NotePayload)
    -> Result<Note, ApiError>;

    async fn delete_note(&self, patient_id: Uuid, note_id: Uuid) -> Result<(), ApiError>;

    async fn get_summary(&self, patient_id: Uuid) -> Result<PatientSummary, ApiError>;
}
