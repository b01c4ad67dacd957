//! HTTP client for the patient records REST API.

use std::time::Instant;

use async_trait::async_trait;
use metrics::counter;
use patientdesk_api_types::{
    Note, NotePayload, Patient, PatientPage, PatientPayload, PatientSummary,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::application::error::{ApiError, RequestKind};
use crate::application::list_query::ListQueryParams;
use crate::application::repos::PatientGateway;
use crate::config::ApiSettings;

use super::error::InfraError;

const METRIC_REQUEST: &str = "patientdesk_api_request_total";

/// Typed calls against the backend, one per operation.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::client(err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base_url.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("patientdesk/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::network(format!("invalid request url `{path}`: {err}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        op: &'static str,
        path: &str,
        query: &[(&'static str, String)],
        kind: RequestKind,
    ) -> Result<T, ApiError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        let response = self.send(op, self.client.get(url)).await?;
        Self::handle(op, response, kind).await
    }

    async fn send_json<T, B>(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let response = self
            .send(op, self.client.request(method, url).json(body))
            .await?;
        Self::handle(op, response, RequestKind::Other).await
    }

    async fn delete(&self, op: &'static str, path: &str) -> Result<(), ApiError> {
        let url = self.url(path)?;
        let response = self.send(op, self.client.delete(url)).await?;
        let status = response.status();
        if status.is_success() {
            counter!(METRIC_REQUEST, "op" => op, "outcome" => "ok").increment(1);
            return Ok(());
        }
        let body = response.bytes().await.map_err(ApiError::from)?;
        Err(Self::failure(op, status, &body, RequestKind::Other))
    }

    async fn send(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, ApiError> {
        let started_at = Instant::now();
        match request.send().await {
            Ok(response) => {
                debug!(
                    op,
                    status = response.status().as_u16(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "API response received"
                );
                Ok(response)
            }
            Err(err) => {
                counter!(METRIC_REQUEST, "op" => op, "outcome" => "network").increment(1);
                warn!(op, error = %err, "API request did not complete");
                Err(ApiError::from(err))
            }
        }
    }

    async fn handle<T: DeserializeOwned>(
        op: &'static str,
        response: Response,
        kind: RequestKind,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.bytes().await.map_err(ApiError::from)?;
        if !status.is_success() {
            return Err(Self::failure(op, status, &body, kind));
        }

        serde_json::from_slice(&body).map_err(|err| {
            counter!(METRIC_REQUEST, "op" => op, "outcome" => "decode").increment(1);
            warn!(op, error = %err, "API response body did not match the expected shape");
            ApiError::decode(err.to_string())
        })
        .inspect(|_| {
            counter!(METRIC_REQUEST, "op" => op, "outcome" => "ok").increment(1);
        })
    }

    fn failure(op: &'static str, status: StatusCode, body: &[u8], kind: RequestKind) -> ApiError {
        let error = ApiError::from_response(status.as_u16(), body, kind);
        counter!(METRIC_REQUEST, "op" => op, "outcome" => "error").increment(1);
        warn!(op, status = status.as_u16(), error = %error, "API request failed");
        error
    }
}

#[async_trait]
impl PatientGateway for ApiClient {
    async fn list_patients(&self, params: &ListQueryParams) -> Result<PatientPage, ApiError> {
        self.get(
            "list_patients",
            "patients",
            &params.to_query_pairs(),
            RequestKind::Other,
        )
        .await
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient, ApiError> {
        self.get(
            "get_patient",
            &format!("patients/{id}"),
            &[],
            RequestKind::RecordRead,
        )
        .await
    }

    async fn create_patient(&self, payload: &PatientPayload) -> Result<Patient, ApiError> {
        self.send_json("create_patient", Method::POST, "patients", payload)
            .await
    }

    async fn update_patient(
        &self,
        id: Uuid,
        payload: &PatientPayload,
    ) -> Result<Patient, ApiError> {
        self.send_json(
            "update_patient",
            Method::PUT,
            &format!("patients/{id}"),
            payload,
        )
        .await
    }

    async fn delete_patient(&self, id: Uuid) -> Result<(), ApiError> {
        self.delete("delete_patient", &format!("patients/{id}"))
            .await
    }

    async fn list_notes(&self, patient_id: Uuid) -> Result<Vec<Note>, ApiError> {
        self.get(
            "list_notes",
            &format!("patients/{patient_id}/notes"),
            &[],
            RequestKind::RecordRead,
        )
        .await
    }

    async fn create_note(&self, patient_id: Uuid, payload: &NotePayload) -> Result<Note, ApiError> {
        self.send_json(
            "create_note",
            Method::POST,
            &format!("patients/{patient_id}/notes"),
            payload,
        )
        .await
    }

    async fn delete_note(&self, patient_id: Uuid, note_id: Uuid) -> Result<(), ApiError> {
        self.delete(
            "delete_note",
            &format!("patients/{patient_id}/notes/{note_id}"),
        )
        .await
    }

    async fn get_summary(&self, patient_id: Uuid) -> Result<PatientSummary, ApiError> {
        self.get(
            "get_summary",
            &format!("patients/{patient_id}/summary"),
            &[],
            RequestKind::RecordRead,
        )
        .await
    }
}
