//! Feature engineering for the hiring models
//!
//! This module provides:
//! - Label encoders with a reserved "Unknown" bucket
//! - Temporal features from the position creation date
//! - Historical per-partner and per-role aggregates frozen at training time
//! - A standard scaler for the anomaly detector's numeric subset

mod encoder;
mod pipeline;

pub use encoder::{LabelEncoder, StandardScaler};
pub use pipeline::{
    AggregateTable, EncoderState, FeatureColumn, FeatureVector, HistoricalAggregates,
    NumericColumn, NumericScaling, BUDGET_VARIANCE_FEATURES, ENCODED_FIELDS, SUCCESS_FEATURES,
    TIME_TO_FILL_FEATURES,
};
