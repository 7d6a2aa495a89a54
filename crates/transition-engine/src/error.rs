//! Error types for transition-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Harmonization is disabled")]
    ConfigurationDisabled,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Empty selection: no content ids given")]
    EmptySelection,

    #[error("Timestamp out of range: {0}")]
    OutOfRange(i64),
}

pub type Result<T> = std::result::Result<T, EngineError>;
