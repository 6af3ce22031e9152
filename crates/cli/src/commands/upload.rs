//! Upload-related CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, TrainingReport, UploadSummary};
use crate::output::{
    color_status, format_timestamp, print_heading, print_info, print_json, print_rows,
    print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

#[derive(Tabled)]
struct UploadRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Uploaded")]
    uploaded_at: String,
    #[tabled(rename = "Hired")]
    hired: usize,
    #[tabled(rename = "Pipeline")]
    pipeline: usize,
}

/// Kind sent with an upload; CSV files default to hired, workbooks name their own sheets
pub fn upload_kind<'a>(path: &Path, kind: Option<&'a str>) -> Option<&'a str> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    match kind {
        Some(kind) => Some(kind),
        None if is_csv => Some("hired"),
        None => None,
    }
}

/// Upload a workbook or CSV file
pub async fn upload_file(
    client: &ApiClient,
    path: &Path,
    kind: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("File name is not valid UTF-8")?;

    let result = client
        .upload(filename, upload_kind(path, kind), bytes)
        .await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.duplicate {
                print_warning(&format!(
                    "Identical file already ingested as upload {}; nothing changed",
                    result.upload_id
                ));
                return Ok(());
            }

            print_success(&format!(
                "Stored upload {} ({} hired, {} pipeline records)",
                result.upload_id, result.hired_records, result.pipeline_records
            ));
            for diagnostic in &result.diagnostics {
                print_info(diagnostic);
            }
            if let Some(report) = &result.training {
                println!();
                print_training(report);
            }
        }
    }

    Ok(())
}

pub fn print_training(report: &TrainingReport) {
    print_heading(&format!(
        "Training on {} hired records ({} ms)",
        report.corpus_size, report.duration_ms
    ));
    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|(model, outcome)| OutcomeRow {
            model: model.clone(),
            status: color_status(&outcome.status),
            detail: match (&outcome.samples, &outcome.reason) {
                (Some(samples), _) => format!("{} samples", samples),
                (None, Some(reason)) => reason.clone(),
                (None, None) => String::new(),
            },
        })
        .collect();
    print_rows(rows, "No models attempted");
}

/// List stored uploads
pub async fn list_uploads(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let uploads: Vec<UploadSummary> = client.get("api/uploads", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&uploads)?,
        OutputFormat::Table => {
            println!("{}", "Uploads".bold());
            let rows = uploads
                .into_iter()
                .map(|u| UploadRow {
                    id: u.id,
                    source: u.source_name,
                    uploaded_at: format_timestamp(&u.uploaded_at),
                    hired: u.hired_records,
                    pipeline: u.pipeline_records,
                })
                .collect();
            print_rows(rows, "No uploads yet");
        }
    }

    Ok(())
}
