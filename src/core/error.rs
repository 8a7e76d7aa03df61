//! Error taxonomy for data acquisition.
//!
//! Every failure the pipeline surfaces is an [`AcquisitionError`], so callers can
//! either match a specific variant or treat the whole enum as "acquisition failed".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Transport or HTTP status failure, raised after retries are exhausted.
    #[error("Network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Parsed or assembled data breaks a hard invariant.
    #[error("Data validation failed: {0}")]
    DataValidation(String),

    /// A JSON document did not match the modelled response shape.
    #[error("Unexpected response shape from {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquisitionError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        AcquisitionError::Network {
            url: url.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn network_msg(url: impl Into<String>, message: impl Into<String>) -> Self {
        AcquisitionError::Network {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AcquisitionError::DataValidation(message.into())
    }

    pub fn unexpected(endpoint: impl Into<String>, detail: impl ToString) -> Self {
        AcquisitionError::UnexpectedResponse {
            endpoint: endpoint.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AcquisitionError::Network { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AcquisitionError::DataValidation(_))
    }
}

pub type Result<T, E = AcquisitionError> = std::result::Result<T, E>;
