//! End-to-end checks: file on disk -> dataset -> analysis / forecast / export.

use std::fs;
use std::path::{Path, PathBuf};

use excel_plotter::app::pipeline::{AnalysisOutcome, AnalysisView, run_analysis};
use excel_plotter::chart::Chart;
use excel_plotter::domain::{ColumnMarkers, Granularity, LoadOptions, ReportType, Selections, Value};
use excel_plotter::io::ingest::{DateStatus, load_dataset};
use excel_plotter::services::{AdditiveForecaster, run_forecast};

fn options(path: &Path) -> LoadOptions {
    LoadOptions {
        path: path.to_path_buf(),
        sheet: None,
        date_column: "CDATE".to_string(),
        markers: ColumnMarkers::default(),
    }
}

fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn ready(outcome: AnalysisOutcome) -> AnalysisView {
    match outcome {
        AnalysisOutcome::Ready(view) => view,
        other => panic!("expected a ready analysis, got {other:?}"),
    }
}

const SALES_CSV: &str = "CDATE,RegionCd,SalesAmt,SalesQty\n\
20230101,A,10,1\n\
20230101,B,20,2\n\
20230201,A,5,3\n";

#[test]
fn csv_month_grouping_and_region_filter() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = load_dataset(&options(&write_csv(dir.path(), "sales.csv", SALES_CSV))).unwrap();
    assert_eq!(dataset.date_status, DateStatus::Parsed);
    assert_eq!(dataset.roles.grouping, vec!["RegionCd"]);

    let mut selections = Selections {
        granularity: Granularity::Month,
        dimensions: vec!["RegionCd".to_string()],
        ..Selections::default()
    };

    let view = ready(run_analysis(&dataset, &selections).unwrap());
    let rows: Vec<(String, String, f64)> = view
        .aggregated
        .rows()
        .iter()
        .map(|r| (r[0].to_string(), r[1].to_string(), r[2].as_f64().unwrap()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("A".to_string(), "2023-01".to_string(), 10.0),
            ("A".to_string(), "2023-02".to_string(), 5.0),
            ("B".to_string(), "2023-01".to_string(), 20.0),
        ]
    );
    assert!(view.chart.is_none());

    selections
        .visual_filters
        .insert("RegionCd".to_string(), Value::from("A"));
    let view = ready(run_analysis(&dataset, &selections).unwrap());
    assert_eq!(view.filtered.len(), 2);
    let Some(Chart::Line(chart)) = view.chart else {
        panic!("expected a line chart");
    };
    assert_eq!(chart.categories, vec!["2023-01", "2023-02"]);
    assert!(chart.has_right_axis());

    let out = dir.path().join("filtered.csv");
    excel_plotter::io::export::write_table_csv(&out, &view.filtered).unwrap();
    let written = fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("RegionCd,DateFilter,SalesAmt,SalesQty"), "{written}");
    assert_eq!(written.lines().count(), 3);
}

#[test]
fn xlsx_comparison_over_a_date_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sales.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sales").unwrap();
    for (col, name) in ["CDATE", "RegionCd", "StoreCd", "SalesAmt"].iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    let rows = [
        (20230101.0, "A", "S1", 10.0),
        (20230115.0, "A", "S2", 15.0),
        (20230115.0, "B", "S3", 20.0),
        (20230301.0, "B", "S3", 99.0),
    ];
    for (i, (date, region, store, amt)) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_number(r, 0, *date).unwrap();
        sheet.write_string(r, 1, *region).unwrap();
        sheet.write_string(r, 2, *store).unwrap();
        sheet.write_number(r, 3, *amt).unwrap();
    }
    workbook.save(&path).unwrap();

    let dataset = load_dataset(&options(&path)).unwrap();
    assert_eq!(dataset.sheet.as_deref(), Some("Sales"));
    assert!(dataset.date_ready());

    let mut selections = Selections {
        report: ReportType::Comparison,
        dimensions: vec!["RegionCd".to_string()],
        date_range: Some(excel_plotter::domain::DateRange {
            start: chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        }),
        ..Selections::default()
    };
    selections.comparison_filters.insert(
        "RegionCd".to_string(),
        vec![Value::from("A"), Value::from("B")],
    );

    let view = ready(run_analysis(&dataset, &selections).unwrap());
    let Some(Chart::Bar(chart)) = view.chart else {
        panic!("expected a bar chart");
    };
    assert_eq!(chart.categories, vec!["A", "B"]);
    // The March row is outside the range.
    assert_eq!(chart.series[0].values, vec![25.0, 20.0]);
}

#[test]
fn missing_date_column_still_previews() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "nodate.csv", "RegionCd,SalesAmt\nA,1\nB,2\n");
    let dataset = load_dataset(&options(&path)).unwrap();

    assert_eq!(dataset.date_status, DateStatus::Missing);
    assert_eq!(dataset.table.len(), 2);
    let summary = excel_plotter::report::format_dataset_summary(&dataset);
    assert!(summary.contains("The 'CDATE' column does not exist"), "{summary}");

    match run_analysis(&dataset, &Selections::default()).unwrap() {
        AnalysisOutcome::Unavailable { reason } => assert!(reason.contains("CDATE")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn malformed_date_reports_the_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "bad.csv",
        "CDATE,RegionCd,SalesAmt\n20230101,A,1\n2023-13-45,B,2\n",
    );
    let dataset = load_dataset(&options(&path)).unwrap();

    let DateStatus::Invalid(errors) = &dataset.date_status else {
        panic!("expected invalid dates, got {:?}", dataset.date_status);
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 3);
    assert!(dataset.date_message().unwrap().contains("line 3"));
}

#[test]
fn forecast_extends_a_year_past_the_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = String::from("CDATE,SalesAmt\n");
    for day in 1..=28 {
        body.push_str(&format!("202302{day:02},{}\n", 100 + day));
    }
    let dataset = load_dataset(&options(&write_csv(dir.path(), "daily.csv", &body))).unwrap();

    let forecast = run_forecast(&AdditiveForecaster::default(), &dataset.table, "CDATE", "SalesAmt").unwrap();
    assert_eq!(forecast.history_len, 28);
    assert_eq!(forecast.future_rows().count(), 365);
    let last = forecast.rows.last().unwrap();
    assert_eq!(last.ds, chrono::NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
    assert!(last.yhat_lower <= last.yhat && last.yhat <= last.yhat_upper);
}
