//! Error types for the fallible seams of the engine
//!
//! Only ingestion surfaces errors to users. Training and bundle errors are
//! folded into per-model outcomes and an untrained fallback by their callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no \"Hired\" or \"Final\" sheet found")]
    NoUsableSheet,

    #[error("unreadable workbook: {0}")]
    UnreadableWorkbook(String),

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV uploads need an explicit sheet kind")]
    MissingKind,

    #[error("upload is empty")]
    Empty,

    #[error("failed to store upload: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("{available} labeled rows, need at least {required}")]
    InsufficientSamples { available: usize, required: usize },

    #[error("need at least {required} numeric columns, found {present}")]
    InsufficientColumns { present: usize, required: usize },

    #[error("feature matrix is empty or ragged")]
    InvalidMatrix,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle I/O failed: {0:#}")]
    Io(anyhow::Error),

    #[error("bundle is corrupt: {0}")]
    Corrupt(String),

    #[error("bundle checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unsupported bundle format version {0}")]
    UnsupportedVersion(u32),
}

impl TrainingError {
    /// Data-insufficiency is a skip, anything else is a failure
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            TrainingError::InsufficientSamples { .. } | TrainingError::InsufficientColumns { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_usable_sheet_message() {
        assert_eq!(
            IngestError::NoUsableSheet.to_string(),
            "no \"Hired\" or \"Final\" sheet found"
        );
    }

    #[test]
    fn test_insufficient_data_classification() {
        assert!(TrainingError::InsufficientSamples {
            available: 9,
            required: 10
        }
        .is_insufficient_data());
        assert!(!TrainingError::InvalidMatrix.is_insufficient_data());
    }
}
