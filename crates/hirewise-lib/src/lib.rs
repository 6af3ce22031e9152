//! Recruitment-pipeline insights engine
//!
//! This crate provides the core functionality for:
//! - Ingesting hiring spreadsheets and reconciling their schema
//! - Derived funnel metrics and feature engineering
//! - Training and serving four models over historical hires
//! - Filtered dashboard aggregation with commentary
//! - Record and model bundle storage, metrics and structured logging

pub mod analytics;
pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod features;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod schema;
pub mod store;
pub mod training;

pub use config::{CommentaryThresholds, EngineConfig, TrainingConfig};
pub use engine::{IngestOutcome, InsightsEngine, MlStatus, ModelHandle};
pub use error::{BundleError, IngestError, TrainingError};
pub use models::*;
pub use observability::{render_metrics, EngineMetrics, StructuredLogger};
