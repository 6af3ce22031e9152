//! API client for communicating with the Hirewise server

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Failure reported by the server itself
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

/// API client for the Hirewise server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            // Uploads retrain synchronously
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError { status, message }.into());
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path, query)?)
            .send()
            .await
            .context("Failed to send request")?;
        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path, query)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;
        Self::decode(response).await
    }

    /// Upload raw file bytes
    pub async fn upload(&self, filename: &str, kind: Option<&str>, bytes: Vec<u8>) -> Result<UploadResponse> {
        let mut query = vec![("filename", filename.to_string())];
        if let Some(kind) = kind {
            query.push(("kind", kind.to_string()));
        }
        let response = self
            .client
            .post(self.url("api/upload", &query)?)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .context("Failed to send upload")?;
        Self::decode(response).await
    }
}

/// `upload_id` query parameter when one is given
pub fn upload_query(upload: Option<u64>) -> Vec<(&'static str, String)> {
    upload
        .map(|id| vec![("upload_id", id.to_string())])
        .unwrap_or_default()
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub corpus_size: usize,
    pub outcomes: BTreeMap<String, ModelOutcome>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: u64,
    pub duplicate: bool,
    pub hired_records: usize,
    pub pipeline_records: usize,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    pub training: Option<TrainingReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub id: u64,
    pub source_name: String,
    pub uploaded_at: String,
    pub hired_records: usize,
    pub pipeline_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlStatus {
    pub is_trained: bool,
    pub version: u64,
    pub trained_at: Option<String>,
    pub models: BTreeMap<String, bool>,
    pub capabilities: Vec<String>,
    pub last_training: Option<TrainingReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    pub fields: BTreeMap<String, Vec<String>>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpis {
    pub record_count: usize,
    pub mean_time_to_fill: f64,
    pub mean_conversion_rate: f64,
    pub mean_budget_variance: f64,
    pub total_accepted: f64,
    pub mean_position_age: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funnel {
    pub stages: Vec<FunnelStage>,
    pub monotonic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub ta_partner: String,
    pub positions: usize,
    pub hires: usize,
    pub mean_time_to_fill: Option<f64>,
    pub mean_conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub metric: String,
    pub tier: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub kind: String,
    pub kpis: Kpis,
    pub funnel: Funnel,
    pub leaderboard: Vec<LeaderboardRow>,
    pub commentary: Vec<Insight>,
}

/// `{"status": "predicted", "value": ...}` or `{"status": "unavailable", "reason": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub score: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub time_to_fill: Prediction<i64>,
    pub budget_variance_pct: Prediction<f64>,
    pub success_probability: Prediction<f64>,
    pub anomaly: Prediction<AnomalyScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalousRecord {
    pub req_id: Option<String>,
    pub position_title: Option<String>,
    pub ta_partner: String,
    pub role: String,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub total_records: usize,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
    pub anomalies: Vec<AnomalousRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_ml_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/ml-status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"is_trained": true, "version": 2, "trained_at": "2024-05-01T10:00:00Z",
                    "models": {"time_to_fill": true, "anomaly": false},
                    "capabilities": ["Time-to-fill prediction"], "last_training": null}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let status: MlStatus = client.get("api/ml-status", &[]).await.unwrap();

        mock.assert_async().await;
        assert!(status.is_trained);
        assert_eq!(status.version, 2);
        assert_eq!(status.models["anomaly"], false);
    }

    #[tokio::test]
    async fn test_upload_sends_filename_and_kind() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/upload")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("filename".into(), "hires q1.csv".into()),
                mockito::Matcher::UrlEncoded("kind".into(), "hired".into()),
            ]))
            .match_body("a,b\n1,2\n")
            .with_status(200)
            .with_body(
                r#"{"upload_id": 7, "duplicate": false, "hired_records": 1,
                    "pipeline_records": 0, "training": null}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client
            .upload("hires q1.csv", Some("hired"), b"a,b\n1,2\n".to_vec())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.upload_id, 7);
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": "no \"Hired\" or \"Final\" sheet found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .upload("book.xlsx", None, vec![1, 2, 3])
            .await
            .unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 400);
        assert_eq!(api.message, "no \"Hired\" or \"Final\" sheet found");
    }

    #[tokio::test]
    async fn test_unavailable_prediction_parses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/predictions/time-to-fill")
            .with_status(200)
            .with_body(r#"{"status": "unavailable", "reason": "time_to_fill model is not trained"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let prediction: Prediction<i64> = client
            .post("api/predictions/time-to-fill", &[], &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(prediction.status, "unavailable");
        assert!(prediction.value.is_none());
        assert_eq!(
            prediction.reason.as_deref(),
            Some("time_to_fill model is not trained")
        );
    }

    #[test]
    fn test_upload_query() {
        assert!(upload_query(None).is_empty());
        assert_eq!(upload_query(Some(3)), vec![("upload_id", "3".to_string())]);
    }
}
