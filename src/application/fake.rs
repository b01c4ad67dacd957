//! In-memory gateway for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use patientdesk_api_types::{
    Note, NotePayload, Patient, PatientPage, PatientPayload, PatientStatus, PatientSummary,
    SummaryMode,
};
use time::macros::date;
use uuid::Uuid;

use crate::application::error::ApiError;
use crate::application::list_query::ListQueryParams;
use crate::application::repos::PatientGateway;

pub(crate) fn patient(first: &str, last: &str) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        date_of_birth: date!(1980 - 04 - 12),
        gender: "female".to_string(),
        email: format!("{}@example.com", first.to_lowercase()),
        phone: "555-0100".to_string(),
        address: "1 Main St".to_string(),
        blood_type: None,
        allergies: Vec::new(),
        conditions: Vec::new(),
        status: PatientStatus::Active,
        last_visit_date: None,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

pub(crate) fn payload(first: &str, last: &str) -> PatientPayload {
    let patient = patient(first, last);
    PatientPayload {
        first_name: patient.first_name,
        last_name: patient.last_name,
        date_of_birth: patient.date_of_birth,
        gender: patient.gender,
        email: patient.email,
        phone: patient.phone,
        address: patient.address,
        blood_type: None,
        allergies: Vec::new(),
        conditions: Vec::new(),
        status: PatientStatus::Active,
        last_visit_date: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeGateway {
    patients: Mutex<Vec<Patient>>,
    notes: Mutex<HashMap<Uuid, Vec<Note>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_next: Mutex<Option<ApiError>>,
}

impl FakeGateway {
    pub(crate) fn with_patients(patients: Vec<Patient>) -> Self {
        Self {
            patients: Mutex::new(patients),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn fail_next(&self, error: ApiError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    fn record(&self, op: &'static str) -> Result<(), ApiError> {
        *self.calls.lock().expect("calls lock").entry(op).or_default() += 1;
        match self.fail_next.lock().expect("fail lock").take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find(&self, id: Uuid) -> Result<Patient, ApiError> {
        self.patients
            .lock()
            .expect("patients lock")
            .iter()
            .find(|patient| patient.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Patient not found"))
    }
}

fn apply(patient: &mut Patient, payload: &PatientPayload) {
    patient.first_name = payload.first_name.clone();
    patient.last_name = payload.last_name.clone();
    patient.date_of_birth = payload.date_of_birth;
    patient.email = payload.email.clone();
    patient.status = payload.status;
}

#[async_trait]
impl PatientGateway for FakeGateway {
    async fn list_patients(&self, params: &ListQueryParams) -> Result<PatientPage, ApiError> {
        self.record("list_patients")?;
        let patients = self.patients.lock().expect("patients lock");
        let matching: Vec<Patient> = patients
            .iter()
            .filter(|patient| params.status.is_none_or(|status| patient.status == status))
            .filter(|patient| {
                params.search.as_deref().is_none_or(|search| {
                    patient
                        .full_name()
                        .to_lowercase()
                        .contains(&search.to_lowercase())
                })
            })
            .cloned()
            .collect();
        Ok(PatientPage {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(params.offset as usize)
                .take(params.limit as usize)
                .collect(),
            limit: params.limit,
            offset: params.offset,
        })
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient, ApiError> {
        self.record("get_patient")?;
        self.find(id)
    }

    async fn create_patient(&self, payload: &PatientPayload) -> Result<Patient, ApiError> {
        self.record("create_patient")?;
        let mut created = patient(&payload.first_name, &payload.last_name);
        apply(&mut created, payload);
        self.patients
            .lock()
            .expect("patients lock")
            .push(created.clone());
        Ok(created)
    }

    async fn update_patient(
        &self,
        id: Uuid,
        payload: &PatientPayload,
    ) -> Result<Patient, ApiError> {
        self.record("update_patient")?;
        let mut patients = self.patients.lock().expect("patients lock");
        let patient = patients
            .iter_mut()
            .find(|patient| patient.id == id)
            .ok_or_else(|| ApiError::not_found("Patient not found"))?;
        apply(patient, payload);
        Ok(patient.clone())
    }

    async fn delete_patient(&self, id: Uuid) -> Result<(), ApiError> {
        self.record("delete_patient")?;
        self.patients
            .lock()
            .expect("patients lock")
            .retain(|patient| patient.id != id);
        Ok(())
    }

    async fn list_notes(&self, patient_id: Uuid) -> Result<Vec<Note>, ApiError> {
        self.record("list_notes")?;
        Ok(self
            .notes
            .lock()
            .expect("notes lock")
            .get(&patient_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_note(&self, patient_id: Uuid, payload: &NotePayload) -> Result<Note, ApiError> {
        self.record("create_note")?;
        let note = Note {
            id: Uuid::new_v4(),
            patient_id,
            content: payload.content.clone(),
            timestamp: payload.timestamp.clone(),
            created_at: payload.timestamp.clone(),
        };
        self.notes
            .lock()
            .expect("notes lock")
            .entry(patient_id)
            .or_default()
            .push(note.clone());
        Ok(note)
    }

    async fn delete_note(&self, patient_id: Uuid, note_id: Uuid) -> Result<(), ApiError> {
        self.record("delete_note")?;
        if let Some(notes) = self.notes.lock().expect("notes lock").get_mut(&patient_id) {
            notes.retain(|note| note.id != note_id);
        }
        Ok(())
    }

    async fn get_summary(&self, patient_id: Uuid) -> Result<PatientSummary, ApiError> {
        self.record("get_summary")?;
        let patient = self.find(patient_id)?;
        let notes = self.list_notes_len(patient_id);
        Ok(PatientSummary {
            summary: format!("{} has {notes} notes", patient.full_name()),
            mode: SummaryMode::Template,
        })
    }
}

impl FakeGateway {
    fn list_notes_len(&self, patient_id: Uuid) -> usize {
        self.notes
            .lock()
            .expect("notes lock")
            .get(&patient_id)
            .map_or(0, Vec::len)
    }
}
