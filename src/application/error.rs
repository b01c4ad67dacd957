use patientdesk_api_types::{ErrorEnvelope, UNEXPECTED_ERROR_MESSAGE};
use thiserror::Error;

use crate::application::forms::FormError;
use crate::application::mutations::MutationError;
use crate::infra::error::InfraError;

/// Classified failure of a backend call.
///
/// `Clone` so that one failed request can be handed to every caller that was
/// coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

/// Shape of the request an error response belongs to.
///
/// The backend answers 422 for malformed ids on single-record reads; those
/// are reported as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    RecordRead,
    Other,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Classify a non-2xx response from its status and raw body.
    pub fn from_response(status: u16, body: &[u8], kind: RequestKind) -> Self {
        let message = ErrorEnvelope::from_slice(body)
            .map(|envelope| envelope.message())
            .unwrap_or_else(|| UNEXPECTED_ERROR_MESSAGE.to_string());

        match (status, kind) {
            (404, _) | (422, RequestKind::RecordRead) => Self::not_found(message),
            (422, RequestKind::Other) => Self::validation(message),
            _ => Self::server(status, message),
        }
    }

    /// Text suitable for showing to a user.
    pub fn user_message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::Validation { message }
            | Self::Server { message, .. } => message,
            Self::Network { .. } | Self::Decode { .. } => UNEXPECTED_ERROR_MESSAGE,
        }
    }

    /// Failures worth retrying: transport errors and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            Self::NotFound { .. } | Self::Validation { .. } | Self::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Validation { .. } => Some(422),
            Self::Server { status, .. } => Some(*status),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Failure of a command-line operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Message shown on stderr when a command fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(error) => error.user_message().to_string(),
            Self::Form(error) => error.fields().to_string(),
            Self::Validation(message) => message.clone(),
            Self::Infra(_) | Self::Unexpected(_) => self.to_string(),
        }
    }
}

impl From<MutationError> for AppError {
    fn from(error: MutationError) -> Self {
        match error {
            MutationError::Api(error) => Self::Api(error),
            MutationError::InFlight => Self::validation(error.to_string()),
        }
    }
}
