//! Hirewise CLI
//!
//! Uploads recruitment spreadsheets to a Hirewise server and shows
//! dashboards, model status, forecasts and anomalies.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{dashboard, models, upload};
use std::path::PathBuf;

/// Hirewise recruitment analytics CLI
#[derive(Parser)]
#[command(name = "hw")]
#[command(author, version, about = "CLI for Hirewise recruitment analytics", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via HIREWISE_API_URL env var)
    #[arg(long, env = "HIREWISE_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Kind {
    /// Closed positions ("Hired" sheet)
    Hired,
    /// Open positions ("Pipeline" or "Final" sheet)
    Pipeline,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Hired => "hired",
            Kind::Pipeline => "pipeline",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload an .xlsx workbook or a .csv file
    Upload {
        /// File to upload
        file: PathBuf,

        /// Sheet kind for CSV files (defaults to hired)
        #[arg(long, short)]
        kind: Option<Kind>,
    },

    /// List stored uploads
    Uploads,

    /// Show model training status
    Status,

    /// Show values available for dashboard filters
    Options {
        kind: Kind,

        /// Upload ID (defaults to the latest)
        #[arg(long, short)]
        upload: Option<u64>,
    },

    /// Show KPIs, funnel, leaderboard and commentary
    Dashboard {
        kind: Kind,

        /// Upload ID (defaults to the latest)
        #[arg(long, short)]
        upload: Option<u64>,

        /// Keep only these hiring managers
        #[arg(long)]
        hiring_manager: Vec<String>,

        /// Keep only these TA partners
        #[arg(long)]
        ta_partner: Vec<String>,

        /// Keep only these countries
        #[arg(long)]
        country: Vec<String>,

        /// Keep only these projects
        #[arg(long)]
        project: Vec<String>,

        /// Earliest position created date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest position created date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Forecast outcomes for a position
    Predict {
        /// Position attribute as Field=value, e.g. -f "Role=Data Engineer" (repeatable)
        #[arg(long = "field", short = 'f', required = true)]
        fields: Vec<String>,

        /// Only predict time-to-fill
        #[arg(long)]
        time_to_fill: bool,
    },

    /// List anomalous hired records
    Anomalies {
        /// Upload ID (defaults to the latest)
        #[arg(long, short)]
        upload: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let api_url = config::Config::load()?.resolve_api_url(cli.api_url);
    if cli.verbose {
        eprintln!("Using API at {}", api_url);
    }
    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Upload { file, kind } => {
            upload::upload_file(&client, &file, kind.map(Kind::as_str), cli.format).await?;
        }
        Commands::Uploads => {
            upload::list_uploads(&client, cli.format).await?;
        }
        Commands::Status => {
            models::show_status(&client, cli.format).await?;
        }
        Commands::Options { kind, upload } => {
            dashboard::show_options(&client, kind.as_str(), upload, cli.format).await?;
        }
        Commands::Dashboard {
            kind,
            upload,
            hiring_manager,
            ta_partner,
            country,
            project,
            from,
            to,
        } => {
            let filters = dashboard::FilterArgs {
                hiring_manager,
                ta_partner,
                country,
                project,
                from,
                to,
            };
            dashboard::show_dashboard(&client, kind.as_str(), upload, filters, cli.format).await?;
        }
        Commands::Predict { fields, time_to_fill } => {
            models::predict(&client, &fields, time_to_fill, cli.format).await?;
        }
        Commands::Anomalies { upload } => {
            models::show_anomalies(&client, upload, cli.format).await?;
        }
    }

    Ok(())
}
