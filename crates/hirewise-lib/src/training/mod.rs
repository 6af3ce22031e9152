//! Model training and persistence
//!
//! This module provides:
//! - Bagged CART ensembles for the two regressors and the success classifier
//! - An isolation forest for anomaly scoring
//! - The orchestrator that trains all four into one versioned model set
//! - Atomic, checksummed bundle storage

mod bundle;
mod forest;
mod isolation;
mod orchestrator;

pub use bundle::{decode_bundle, encode_bundle, BundleStore, FileBundleStore, MemoryBundleStore};
pub(crate) use bundle::write_atomic;
pub use forest::{DecisionTree, ForestParams, RandomForest, TreeTask};
pub use isolation::{average_path_length, IsolationForest, IsolationParams};
pub use orchestrator::{
    ModelKind, ModelOutcome, TrainedModelSet, Trainer, TrainingReport, TrainingRun,
};
