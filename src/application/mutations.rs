//! Writes and the cache invalidation they trigger.

use std::sync::{Arc, Mutex};

use patientdesk_api_types::{Note, NotePayload, Patient, PatientPayload};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::ApiError;
use crate::application::queries::QueryClient;
use crate::cache::lock::mutex_lock;
use crate::cache::{KeyFilter, Resource};

const SOURCE: &str = "application::mutations";

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreatePatient(PatientPayload),
    UpdatePatient { id: Uuid, payload: PatientPayload },
    DeletePatient { id: Uuid },
    CreateNote { patient_id: Uuid, payload: NotePayload },
    DeleteNote { patient_id: Uuid, note_id: Uuid },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreatePatient(_) => "create_patient",
            Self::UpdatePatient { .. } => "update_patient",
            Self::DeletePatient { .. } => "delete_patient",
            Self::CreateNote { .. } => "create_note",
            Self::DeleteNote { .. } => "delete_note",
        }
    }

    /// Cache entries made stale by a successful run of this mutation.
    pub fn invalidates(&self) -> Vec<KeyFilter> {
        let lists = KeyFilter::Resource(Resource::PatientList);
        match self {
            Self::CreatePatient(_) => vec![lists],
            Self::UpdatePatient { id, .. } => vec![
                lists,
                KeyFilter::record(Resource::Patient, *id),
                KeyFilter::record(Resource::Summary, *id),
            ],
            Self::DeletePatient { id } => vec![
                lists,
                KeyFilter::record(Resource::Patient, *id),
                KeyFilter::record(Resource::Summary, *id),
                KeyFilter::record(Resource::Notes, *id),
            ],
            Self::CreateNote { patient_id, .. } | Self::DeleteNote { patient_id, .. } => vec![
                KeyFilter::record(Resource::Notes, *patient_id),
                KeyFilter::record(Resource::Summary, *patient_id),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
    Patient(Patient),
    Note(Note),
    Deleted,
}

/// Runs writes through the gateway and invalidates what they touched.
#[derive(Clone)]
pub struct MutationCoordinator {
    queries: QueryClient,
}

impl MutationCoordinator {
    pub fn new(queries: QueryClient) -> Self {
        Self { queries }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Execute `mutation`. Nothing is invalidated when it fails.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutput, ApiError> {
        let gateway = self.queries.gateway();
        let outcome = match &mutation {
            Mutation::CreatePatient(payload) => gateway
                .create_patient(payload)
                .await
                .map(MutationOutput::Patient),
            Mutation::UpdatePatient { id, payload } => gateway
                .update_patient(*id, payload)
                .await
                .map(MutationOutput::Patient),
            Mutation::DeletePatient { id } => gateway
                .delete_patient(*id)
                .await
                .map(|()| MutationOutput::Deleted),
            Mutation::CreateNote {
                patient_id,
                payload,
            } => gateway
                .create_note(*patient_id, payload)
                .await
                .map(MutationOutput::Note),
            Mutation::DeleteNote {
                patient_id,
                note_id,
            } => gateway
                .delete_note(*patient_id, *note_id)
                .await
                .map(|()| MutationOutput::Deleted),
        };

        let output = outcome.inspect_err(|error| {
            warn!(mutation = mutation.name(), error = %error, "Mutation failed");
        })?;

        let invalidated: usize = mutation
            .invalidates()
            .iter()
            .map(|filter| self.queries.invalidate(filter))
            .sum();
        info!(
            mutation = mutation.name(),
            invalidated, "Mutation succeeded"
        );

        Ok(output)
    }
}

/// Submission state of one form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(ApiError),
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("a submission is already in progress")]
    InFlight,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Guards a form against double submission.
#[derive(Clone)]
pub struct MutationControl {
    coordinator: MutationCoordinator,
    state: Arc<Mutex<MutationState>>,
}

impl MutationControl {
    pub fn new(coordinator: MutationCoordinator) -> Self {
        Self {
            coordinator,
            state: Arc::new(Mutex::new(MutationState::Idle)),
        }
    }

    pub fn state(&self) -> MutationState {
        mutex_lock(&self.state, SOURCE, "state").clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == MutationState::Pending
    }

    /// Run `mutation` unless another submission is still pending.
    pub async fn submit(&self, mutation: Mutation) -> Result<MutationOutput, MutationError> {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "submit");
            if *state == MutationState::Pending {
                return Err(MutationError::InFlight);
            }
            *state = MutationState::Pending;
        }

        let mut guard = PendingGuard {
            state: &self.state,
            settled: false,
        };
        let outcome = self.coordinator.mutate(mutation).await;
        guard.settle(match &outcome {
            Ok(_) => MutationState::Succeeded,
            Err(error) => MutationState::Failed(error.clone()),
        });

        Ok(outcome?)
    }

    /// Return to `Idle` after a finished submission.
    pub fn reset(&self) {
        let mut state = mutex_lock(&self.state, SOURCE, "reset");
        if *state != MutationState::Pending {
            *state = MutationState::Idle;
        }
    }
}

/// Puts the control back to `Idle` if a submission is dropped mid-flight.
struct PendingGuard<'a> {
    state: &'a Mutex<MutationState>,
    settled: bool,
}

impl PendingGuard<'_> {
    fn settle(&mut self, next: MutationState) {
        *mutex_lock(self.state, SOURCE, "settle") = next;
        self.settled = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *mutex_lock(self.state, SOURCE, "abandon") = MutationState::Idle;
        }
    }
}
