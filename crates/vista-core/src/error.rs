//! error types for vista

use std::time::Duration;

use thiserror::Error;

use crate::amount::ArithmeticError;

#[derive(Debug, Error)]
pub enum VistaError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("local store error: {0}")]
    LocalStore(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("rejected by node: {0}")]
    Rejected(String),
}

impl VistaError {
    /// remote unreachable or slow; the cached view stays and the next tick retries
    pub fn is_network(&self) -> bool {
        matches!(self, VistaError::Network(_) | VistaError::Timeout(_))
    }
}

impl From<sled::Error> for VistaError {
    fn from(e: sled::Error) -> Self {
        VistaError::LocalStore(e.to_string())
    }
}

impl From<serde_json::Error> for VistaError {
    fn from(e: serde_json::Error) -> Self {
        VistaError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VistaError>;
