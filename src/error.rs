use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{field} {value} is out of range [0.0, 4.0]")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("duplicate {kind} '{key}'")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("invalid campus graph: {0}")]
    InvalidGraph(String),

    #[error("record store failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{cause}; restoring the record files also failed, stored records may not match memory: {restore}")]
    RollbackFailed {
        cause: Box<EngineError>,
        restore: Box<EngineError>,
    },
}

impl EngineError {
    pub fn duplicate(kind: &'static str, key: impl Into<String>) -> Self {
        EngineError::DuplicateKey {
            kind,
            key: key.into(),
        }
    }

    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            key: key.into(),
        }
    }
}

/// Success flag plus the message the host layer shows verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

impl From<Result<String>> for WriteOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(message) => WriteOutcome {
                success: true,
                message,
            },
            Err(err) => WriteOutcome {
                success: false,
                message: err.to_string(),
            },
        }
    }
}
