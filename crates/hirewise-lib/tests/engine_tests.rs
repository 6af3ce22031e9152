//! End-to-end tests through the engine facade

use hirewise_lib::analytics::FilterSpec;
use hirewise_lib::predictor::PositionFields;
use hirewise_lib::training::{ModelKind, ModelOutcome};
use hirewise_lib::{Cell, CategoricalField, EngineConfig, InsightsEngine, SheetKind};
use std::fs;
use tempfile::tempdir;

const HIRED_HEADER: &str = "Req ID,Position Title,TA Partner,Hiring Manager,Role,Country,\
    Position Created Date,Filled Date,Number Of CVs Shared,Number Of 1st Interviews,\
    Number Of Offers,Number Of Accepted Offers,Max Budgeted Salary,Accepted Salary\n";

/// Twelve hires; rows 3 and 7 have no accepted salary
fn hired_csv() -> Vec<u8> {
    let mut csv = String::from(HIRED_HEADER);
    for i in 0..12 {
        let salary = if i == 3 || i == 7 {
            String::new()
        } else {
            format!("{}", 90_000 + i * 1_000)
        };
        csv.push_str(&format!(
            "REQ-{},Engineer {},{},{},{},{},2024-03-{:02},2024-04-{:02},{},{},1,1,100000,{}\n",
            i,
            i,
            ["Alice", "Bob", "Cara"][i % 3],
            ["Dana", "Eli"][i % 2],
            ["Backend", "Frontend"][i % 2],
            ["US", "UK"][i % 2],
            1 + i,
            10 + i,
            8 + i % 5,
            2 + i % 3,
            salary,
        ));
    }
    csv.into_bytes()
}

fn position() -> PositionFields {
    let mut fields = PositionFields::new();
    fields.insert("ta_partner".to_string(), Cell::text("Alice"));
    fields.insert("Role".to_string(), Cell::text("Backend"));
    fields.insert("Country".to_string(), Cell::text("US"));
    fields.insert("Number Of CVs Shared".to_string(), Cell::Number(10.0));
    fields.insert("Max Budgeted Salary".to_string(), Cell::Number(100_000.0));
    fields
}

fn config_in(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn test_upload_to_dashboard_and_models() {
    let dir = tempdir().unwrap();
    let engine = InsightsEngine::open(config_in(dir.path())).unwrap();

    let outcome = engine
        .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
        .unwrap();
    assert_eq!(outcome.hired_records, 12);

    let report = outcome.training.unwrap();
    for kind in ModelKind::ALL {
        assert!(report.outcomes[&kind].is_trained(), "{} not trained", kind);
    }
    assert_eq!(
        report.outcomes[&ModelKind::BudgetVariance],
        ModelOutcome::Trained { samples: 10 }
    );
    assert_eq!(
        report.outcomes[&ModelKind::TimeToFill],
        ModelOutcome::Trained { samples: 12 }
    );

    let dashboard = engine.get_dashboard_data(SheetKind::Hired, None, &FilterSpec::new());
    assert_eq!(dashboard.kpis.record_count, 12);
    assert_eq!(dashboard.kpis.samples.budget_variance, 10);
    // Salaries 90k + i*1k over the ten rows with a salary, against a 100k budget
    let expected: f64 = (0..12)
        .filter(|i| *i != 3 && *i != 7)
        .map(|i| (90_000.0 + i as f64 * 1_000.0 - 100_000.0) / 100_000.0 * 100.0)
        .sum::<f64>()
        / 10.0;
    assert!((dashboard.kpis.mean_budget_variance - expected).abs() < 1e-9);
    // Every row fills 40 days after creation
    assert_eq!(dashboard.kpis.mean_time_to_fill, 40.0);

    let status = engine.get_ml_status();
    assert!(status.is_trained);
    assert_eq!(status.capabilities.len(), 4);

    let forecast = engine.forecast(&position());
    assert!(forecast.unavailable().is_empty(), "{:?}", forecast.unavailable());
    let days = *forecast.time_to_fill.value().unwrap();
    assert!(days >= 1);
    let p = *forecast.success_probability.value().unwrap();
    assert!((0.0..=1.0).contains(&p));
}

#[test]
fn test_filtered_dashboard_and_options() {
    let dir = tempdir().unwrap();
    let engine = InsightsEngine::open(config_in(dir.path())).unwrap();
    engine
        .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
        .unwrap();

    let options = engine.get_filter_options(SheetKind::Hired, None);
    assert_eq!(
        options.fields[&CategoricalField::TaPartner],
        vec!["Alice", "Bob", "Cara"]
    );
    assert!(options.date_range.is_some());

    let filter = FilterSpec::new()
        .with(CategoricalField::Country, ["US"])
        .with(CategoricalField::TaPartner, ["Alice"]);
    let dashboard = engine.get_dashboard_data(SheetKind::Hired, None, &filter);
    // Alice has rows 0, 3, 6, 9; US rows are even
    assert_eq!(dashboard.kpis.record_count, 2);
    assert_eq!(dashboard.leaderboard.len(), 1);
    assert_eq!(dashboard.leaderboard[0].ta_partner, "Alice");

    // Every partner has the same time-to-fill, so encounter order is kept
    let full = engine.get_dashboard_data(SheetKind::Hired, None, &FilterSpec::new());
    let partners: Vec<&str> = full
        .leaderboard
        .iter()
        .map(|row| row.ta_partner.as_str())
        .collect();
    assert_eq!(partners, ["Alice", "Bob", "Cara"]);

    let pipeline = engine.get_dashboard_data(SheetKind::Pipeline, None, &FilterSpec::new());
    assert_eq!(pipeline.kpis.record_count, 0);
}

#[test]
fn test_bundle_survives_restart_with_identical_predictions() {
    let dir = tempdir().unwrap();
    let (before, status_before) = {
        let engine = InsightsEngine::open(config_in(dir.path())).unwrap();
        engine
            .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
            .unwrap();
        (engine.forecast(&position()), engine.get_ml_status())
    };

    let reopened = InsightsEngine::open(config_in(dir.path())).unwrap();
    assert_eq!(reopened.get_ml_status(), status_before);
    assert_eq!(reopened.forecast(&position()), before);
    assert_eq!(reopened.list_uploads().len(), 1);

    // Stored uploads are still deduplicated after a restart
    let again = reopened
        .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
        .unwrap();
    assert!(again.duplicate);
}

#[test]
fn test_corrupt_bundle_starts_untrained() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(config.bundle_path(), "{\"format_version\": 1, \"checksum\": \"00\"").unwrap();

    let engine = InsightsEngine::open(config).unwrap();
    let status = engine.get_ml_status();
    assert!(!status.is_trained);
    assert!(!engine.predict_time_to_fill(&position()).is_available());

    // The next upload trains normally and replaces the bad file
    engine
        .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
        .unwrap();
    assert!(engine.get_ml_status().is_trained);
}

#[test]
fn test_anomalies_over_latest_upload() {
    let dir = tempdir().unwrap();
    let engine = InsightsEngine::open(config_in(dir.path())).unwrap();
    assert!(!engine.detect_anomalies(None).is_available());

    engine
        .ingest("hires.csv", &hired_csv(), Some(SheetKind::Hired))
        .unwrap();
    let report = engine.detect_anomalies(None);
    let report = report.value().unwrap();
    assert_eq!(report.total_records, 12);
    assert!(report.anomaly_count <= report.total_records);
}
