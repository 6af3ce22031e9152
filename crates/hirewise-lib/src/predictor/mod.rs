//! Prediction service over a trained model set

mod anomalies;
mod service;

pub use anomalies::{detect_anomalies, AnomalousRecord, AnomalyReport};
pub use service::{AnomalyScore, Forecast, PositionFields, Prediction, PredictionService};
