//! Model status, prediction and anomaly CLI commands

use anyhow::{bail, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use tabled::Tabled;

use crate::client::{upload_query, AnomalyReport, ApiClient, Forecast, MlStatus, Prediction};
use crate::commands::upload::print_training;
use crate::output::{
    color_status, format_percent, format_signed_percent, format_timestamp, print_heading,
    print_json, print_rows, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Trained")]
    trained: String,
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Result")]
    result: String,
}

#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Req ID")]
    req_id: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "TA Partner")]
    ta_partner: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Parse `Field=value` into a JSON member; numeric values are sent as numbers
pub fn parse_field(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected Field=value, got '{}'", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("missing field name in '{}'", raw);
    }
    let value = value.trim();
    let json = match value.parse::<f64>() {
        Ok(n) if n.is_finite() => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string())),
        _ => Value::String(value.to_string()),
    };
    Ok((name.to_string(), json))
}

fn describe<T>(prediction: &Prediction<T>, show: impl Fn(&T) -> String) -> String {
    match (&prediction.value, &prediction.reason) {
        (Some(value), _) => show(value),
        (None, Some(reason)) => format!("{} ({})", color_status("unavailable"), reason),
        (None, None) => color_status("unavailable"),
    }
}

/// Show which models are trained
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: MlStatus = client.get("api/ml-status", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            if !status.is_trained {
                print_warning("No trained models yet; upload at least 10 hired records");
            } else {
                println!(
                    "{} v{} trained {}",
                    "Model set".bold(),
                    status.version,
                    status
                        .trained_at
                        .as_deref()
                        .map(format_timestamp)
                        .unwrap_or_default()
                );
            }
            let rows = status
                .models
                .iter()
                .map(|(model, trained)| ModelRow {
                    model: model.clone(),
                    trained: color_status(if *trained { "yes" } else { "no" }),
                })
                .collect();
            print_rows(rows, "No models");
            if let Some(report) = &status.last_training {
                println!();
                print_training(report);
            }
        }
    }

    Ok(())
}

/// Predict for one position described by `Field=value` pairs
pub async fn predict(
    client: &ApiClient,
    fields: &[String],
    time_to_fill_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let body: Map<String, Value> = fields
        .iter()
        .map(|raw| parse_field(raw))
        .collect::<Result<_>>()?;

    if time_to_fill_only {
        let prediction: Prediction<i64> = client
            .post("api/predictions/time-to-fill", &[], &body)
            .await?;
        return match format {
            OutputFormat::Json => print_json(&prediction),
            OutputFormat::Table => {
                println!(
                    "Time to fill: {}",
                    describe(&prediction, |d| format!("{} days", d).green().to_string())
                );
                Ok(())
            }
        };
    }

    let forecast: Forecast = client.post("api/predictions", &[], &body).await?;
    match format {
        OutputFormat::Json => print_json(&forecast)?,
        OutputFormat::Table => {
            print_heading("Forecast");
            let rows = vec![
                PredictionRow {
                    target: "Time to fill".to_string(),
                    result: describe(&forecast.time_to_fill, |d| format!("{} days", d)),
                },
                PredictionRow {
                    target: "Budget variance".to_string(),
                    result: describe(&forecast.budget_variance_pct, |v| format_signed_percent(*v)),
                },
                PredictionRow {
                    target: "Success probability".to_string(),
                    result: describe(&forecast.success_probability, |p| format_percent(p * 100.0)),
                },
                PredictionRow {
                    target: "Anomaly".to_string(),
                    result: describe(&forecast.anomaly, |a| {
                        let flag = if a.is_anomaly { "anomalous".red().to_string() } else { "typical".to_string() };
                        format!("{} (score {:.3})", flag, a.score)
                    }),
                },
            ];
            print_rows(rows, "");
        }
    }

    Ok(())
}

/// List anomalous hired records
pub async fn show_anomalies(client: &ApiClient, upload: Option<u64>, format: OutputFormat) -> Result<()> {
    let result: Prediction<AnomalyReport> = client.get("api/anomalies", &upload_query(upload)).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => match (&result.value, &result.reason) {
            (Some(report), _) => {
                println!(
                    "{} {} of {} records ({})",
                    "Anomalies:".bold(),
                    report.anomaly_count,
                    report.total_records,
                    format_percent(report.anomaly_rate)
                );
                let rows = report
                    .anomalies
                    .iter()
                    .map(|a| AnomalyRow {
                        req_id: a.req_id.clone().unwrap_or_else(|| "-".to_string()),
                        position: a.position_title.clone().unwrap_or_else(|| a.role.clone()),
                        ta_partner: a.ta_partner.clone(),
                        score: format!("{:.3}", a.score),
                        reason: a.reason.clone(),
                    })
                    .collect();
                print_rows(rows, "Nothing unusual");
            }
            (None, reason) => {
                print_warning(&format!(
                    "Anomaly detection unavailable: {}",
                    reason.as_deref().unwrap_or("unknown reason")
                ));
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("Role=Data Engineer").unwrap(),
            ("Role".to_string(), Value::String("Data Engineer".to_string()))
        );
        assert_eq!(
            parse_field("Max Budgeted Salary = 90000").unwrap(),
            ("Max Budgeted Salary".to_string(), serde_json::json!(90000.0))
        );
        assert_eq!(
            parse_field("Position Created Date=2024-03-01").unwrap().1,
            Value::String("2024-03-01".to_string())
        );
        assert!(parse_field("Role").is_err());
        assert!(parse_field("=x").is_err());
    }
}
