use thiserror::Error;

/// Failures outside the backend API: local input, client setup, bootstrap.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("failed to build HTTP client: {message}")]
    Client { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("{message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
