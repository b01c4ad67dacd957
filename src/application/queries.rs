//! Cached reads against the patient backend.
//!
//! Each read binds a gateway call to its canonical [`QueryKey`] and routes it
//! through the cache for its resource.

use std::sync::Arc;

use patientdesk_api_types::{Note, Patient, PatientPage, PatientSummary};
use tracing::debug;
use uuid::Uuid;

use crate::application::list_query::ListQueryParams;
use crate::application::repos::PatientGateway;
use crate::cache::{
    CacheConfig, CacheEntry, KeyFilter, Loader, QueryCache, QueryKey, Resource, Subscription,
    loader, with_retry,
};

/// Entry point for every read the dashboard performs.
#[derive(Clone)]
pub struct QueryClient {
    gateway: Arc<dyn PatientGateway>,
    retry_attempts: u32,
    patient_lists: QueryCache<PatientPage>,
    patients: QueryCache<Patient>,
    notes: QueryCache<Vec<Note>>,
    summaries: QueryCache<PatientSummary>,
}

impl QueryClient {
    pub fn new(gateway: Arc<dyn PatientGateway>, config: &CacheConfig) -> Self {
        let ttl = config.default_ttl();
        Self {
            gateway,
            retry_attempts: config.retry_attempts,
            patient_lists: QueryCache::new("patient_lists", ttl, config),
            patients: QueryCache::new("patients", ttl, config),
            notes: QueryCache::new("notes", ttl, config),
            summaries: QueryCache::new("summaries", config.summary_ttl(), config),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PatientGateway> {
        &self.gateway
    }

    pub fn patient_lists(&self) -> &QueryCache<PatientPage> {
        &self.patient_lists
    }

    pub fn patient_records(&self) -> &QueryCache<Patient> {
        &self.patients
    }

    pub fn note_lists(&self) -> &QueryCache<Vec<Note>> {
        &self.notes
    }

    pub fn summaries(&self) -> &QueryCache<PatientSummary> {
        &self.summaries
    }

    // Patient lists

    pub fn patients_loader(&self, params: &ListQueryParams) -> Loader<PatientPage> {
        let gateway = Arc::clone(&self.gateway);
        let params = params.clone();
        with_retry(
            self.retry_attempts,
            loader(move || {
                let gateway = Arc::clone(&gateway);
                let params = params.clone();
                async move { gateway.list_patients(&params).await }
            }),
        )
    }

    pub async fn patients(&self, params: &ListQueryParams) -> CacheEntry<PatientPage> {
        self.patient_lists
            .fetch(params.query_key(), self.patients_loader(params))
            .await
    }

    pub async fn refetch_patients(&self, params: &ListQueryParams) -> CacheEntry<PatientPage> {
        self.patient_lists
            .refetch(params.query_key(), self.patients_loader(params))
            .await
    }

    pub fn subscribe_patients(&self, params: &ListQueryParams) -> Subscription<PatientPage> {
        self.patient_lists
            .subscribe(params.query_key(), self.patients_loader(params))
    }

    // Single patient

    pub fn patient_loader(&self, id: Uuid) -> Loader<Patient> {
        let gateway = Arc::clone(&self.gateway);
        with_retry(
            self.retry_attempts,
            loader(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.get_patient(id).await }
            }),
        )
    }

    pub async fn patient(&self, id: Uuid) -> CacheEntry<Patient> {
        self.patients
            .fetch(QueryKey::patient(id), self.patient_loader(id))
            .await
    }

    // Notes

    pub fn notes_loader(&self, patient_id: Uuid) -> Loader<Vec<Note>> {
        let gateway = Arc::clone(&self.gateway);
        with_retry(
            self.retry_attempts,
            loader(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.list_notes(patient_id).await }
            }),
        )
    }

    pub async fn notes(&self, patient_id: Uuid) -> CacheEntry<Vec<Note>> {
        self.notes
            .fetch(QueryKey::notes(patient_id), self.notes_loader(patient_id))
            .await
    }

    pub fn subscribe_notes(&self, patient_id: Uuid) -> Subscription<Vec<Note>> {
        self.notes
            .subscribe(QueryKey::notes(patient_id), self.notes_loader(patient_id))
    }

    // Summaries

    pub fn summary_loader(&self, patient_id: Uuid) -> Loader<PatientSummary> {
        let gateway = Arc::clone(&self.gateway);
        with_retry(
            self.retry_attempts,
            loader(move || {
                let gateway = Arc::clone(&gateway);
                async move { gateway.get_summary(patient_id).await }
            }),
        )
    }

    pub async fn summary(&self, patient_id: Uuid) -> CacheEntry<PatientSummary> {
        self.summaries
            .fetch(QueryKey::summary(patient_id), self.summary_loader(patient_id))
            .await
    }

    /// Mark entries selected by `filter` stale in the cache for its resource.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let matches = |key: &QueryKey| filter.matches(key);
        let invalidated = match filter.resource() {
            Resource::PatientList => self.patient_lists.invalidate(matches),
            Resource::Patient => self.patients.invalidate(matches),
            Resource::Notes => self.notes.invalidate(matches),
            Resource::Summary => self.summaries.invalidate(matches),
        };
        debug!(filter = %filter, invalidated, "Applied cache invalidation");
        invalidated
    }
}
