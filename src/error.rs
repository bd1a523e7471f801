//! Error types for the resilience core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VigilError {
    /// A dependency probe (store, self-reachability, metrics) failed
    #[error("Probe error: {0}")]
    Probe(String),
    #[error("Recovery error: {0}")]
    Recovery(String),
    #[error("Audit error: {0}")]
    Audit(String),
    /// Operator input rejected at the administrative boundary
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigurationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe(message.into())
    }

    pub fn recovery(message: impl Into<String>) -> Self {
        Self::Recovery(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type VigilResult<T> = Result<T, VigilError>;
