//! Dashboard and filter CLI commands

use anyhow::Result;
use chrono::NaiveDate;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{upload_query, ApiClient, Dashboard, DashboardFilter, FilterOptions};
use crate::output::{
    color_status, format_days, format_percent, format_signed_percent, print_heading, print_json,
    print_rows, OutputFormat,
};

#[derive(Tabled)]
struct LeaderboardDisplayRow {
    #[tabled(rename = "TA Partner")]
    ta_partner: String,
    #[tabled(rename = "Positions")]
    positions: usize,
    #[tabled(rename = "Hires")]
    hires: usize,
    #[tabled(rename = "Avg TTF")]
    time_to_fill: String,
    #[tabled(rename = "CV→Interview")]
    conversion: String,
}

#[derive(Tabled)]
struct FunnelRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Total")]
    total: String,
}

/// Command-line filter selections
#[derive(Debug, Default)]
pub struct FilterArgs {
    pub hiring_manager: Vec<String>,
    pub ta_partner: Vec<String>,
    pub country: Vec<String>,
    pub project: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FilterArgs {
    pub fn into_filter(self) -> DashboardFilter {
        let mut filter = DashboardFilter {
            date_from: self.from,
            date_to: self.to,
            ..Default::default()
        };
        for (field, values) in [
            ("hiring_manager", self.hiring_manager),
            ("ta_partner", self.ta_partner),
            ("country", self.country),
            ("project", self.project),
        ] {
            if !values.is_empty() {
                filter.categories.insert(field.to_string(), values);
            }
        }
        filter
    }
}

/// Show the values a dashboard can be filtered on
pub async fn show_options(
    client: &ApiClient,
    kind: &str,
    upload: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let options: FilterOptions = client
        .get(&format!("api/filter-options/{}", kind), &upload_query(upload))
        .await?;

    match format {
        OutputFormat::Json => print_json(&options)?,
        OutputFormat::Table => {
            for (field, values) in &options.fields {
                println!("{:<16} {}", field.bold(), values.join(", "));
            }
            match &options.date_range {
                Some(range) => println!("{:<16} {} to {}", "created".bold(), range.min, range.max),
                None => println!("{:<16} {}", "created".bold(), "no dated records".dimmed()),
            }
        }
    }

    Ok(())
}

/// Show KPIs, funnel, leaderboard and commentary
pub async fn show_dashboard(
    client: &ApiClient,
    kind: &str,
    upload: Option<u64>,
    filters: FilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let dashboard: Dashboard = client
        .post(
            &format!("api/dashboard/{}", kind),
            &upload_query(upload),
            &filters.into_filter(),
        )
        .await?;

    match format {
        OutputFormat::Json => print_json(&dashboard)?,
        OutputFormat::Table => print_dashboard(&dashboard),
    }

    Ok(())
}

fn print_dashboard(dashboard: &Dashboard) {
    let kpis = &dashboard.kpis;
    println!("{} ({})", "Recruitment Dashboard".bold(), dashboard.kind.cyan());
    println!("{}", "=".repeat(50));
    println!("Records:                {}", kpis.record_count);
    println!("Avg time-to-fill:       {}", format_days(kpis.mean_time_to_fill));
    println!("CV→interview rate:      {}", format_percent(kpis.mean_conversion_rate));
    println!(
        "Avg budget variance:    {}",
        format_signed_percent(kpis.mean_budget_variance)
    );
    println!("Accepted offers:        {:.0}", kpis.total_accepted);
    if dashboard.kind == "pipeline" {
        println!("Avg position age:       {}", format_days(kpis.mean_position_age));
    }
    println!();

    print_heading("Funnel");
    let rows: Vec<FunnelRow> = dashboard
        .funnel
        .stages
        .iter()
        .map(|s| FunnelRow {
            stage: s.stage.clone(),
            total: format!("{:.0}", s.total),
        })
        .collect();
    print_rows(rows, "No funnel data");
    if !dashboard.funnel.monotonic {
        println!("{}", "Stage totals increase somewhere; check the source data".yellow());
    }
    println!();

    print_heading("TA Partner Leaderboard");
    let rows: Vec<LeaderboardDisplayRow> = dashboard
        .leaderboard
        .iter()
        .map(|r| LeaderboardDisplayRow {
            ta_partner: r.ta_partner.clone(),
            positions: r.positions,
            hires: r.hires,
            time_to_fill: r.mean_time_to_fill.map(format_days).unwrap_or_else(|| "-".to_string()),
            conversion: format_percent(r.mean_conversion_rate),
        })
        .collect();
    print_rows(rows, "No partners");
    println!();

    print_heading("Commentary");
    for insight in &dashboard.commentary {
        println!("[{}] {}", color_status(&insight.tier), insight.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_args_skip_empty_fields() {
        let filter = FilterArgs {
            ta_partner: vec!["Alice".to_string()],
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        }
        .into_filter();

        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "categories": {"ta_partner": ["Alice"]},
                "date_from": "2024-01-01"
            })
        );
    }
}
