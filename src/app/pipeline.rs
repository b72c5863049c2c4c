//! Shared analysis pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! date labels -> grouped sums -> filters -> chart
//!
//! The grouping and filtering steps run on the dataset's Polars frame; the
//! results come back as [`Table`]s for charts, reports and export.
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use crate::analysis::dates::{date_span, with_date_labels};
use crate::analysis::{Criterion, apply_filters, filter_date_range, group_sum, has_active_selection};
use crate::chart::{Chart, bar_chart, line_chart};
use crate::domain::frame::from_frame;
use crate::domain::{DATE_LABEL_COLUMN, DateRange, ReportType, Selections, Table, Value};
use crate::error::AppError;
use crate::io::ingest::Dataset;

/// Shown instead of a chart when no dimension has a value selected.
pub const SELECT_VALUES_NOTICE: &str = "Please select values to filter the chart.";

/// Shown when no amount or quantity column exists.
pub const MISSING_MEASURES_MESSAGE: &str = "The required columns do not exist in the uploaded file.";

/// Result of one analysis pass.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Date-dependent analysis is disabled for this dataset.
    Unavailable { reason: String },
    /// No measure columns: nothing to aggregate.
    MissingMeasures,
    Ready(AnalysisView),
}

/// All derived outputs for the current selections.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisView {
    pub aggregated: Table,
    pub filtered: Table,
    /// `None` when no dimension has a value selected.
    pub chart: Option<Chart>,
    pub notice: Option<String>,
    /// Measures not summed because they hold non-numeric cells.
    pub dropped: Vec<String>,
    /// Effective Comparison-mode bounds.
    pub date_range: Option<DateRange>,
}

/// Run labels, aggregation, filters and chart building for `selections`.
pub fn run_analysis(dataset: &Dataset, selections: &Selections) -> Result<AnalysisOutcome, AppError> {
    if let Some(reason) = dataset.date_message() {
        return Ok(AnalysisOutcome::Unavailable { reason });
    }
    if !dataset.roles.has_measures() {
        return Ok(AnalysisOutcome::MissingMeasures);
    }

    for dim in &selections.dimensions {
        if !dataset.roles.grouping.contains(dim) {
            return Err(AppError::new(
                2,
                format!(
                    "`{dim}` is not a grouping column. Choose from: {}.",
                    dataset.roles.grouping.join(", ")
                ),
            ));
        }
    }

    let measures = dataset.roles.measures(dataset.table.columns());
    let dims = &selections.dimensions;

    let view = match selections.report {
        ReportType::Visual => {
            let labeled = with_date_labels(&dataset.frame, &dataset.date_column, selections.granularity)?;
            let mut keys = dims.clone();
            keys.push(DATE_LABEL_COLUMN.to_string());
            let agg = group_sum(&labeled, &keys, &measures)?;

            let criteria: Vec<(String, Criterion)> = dims
                .iter()
                .map(|d| {
                    let c = selections
                        .visual_filters
                        .get(d)
                        .map(|v| Criterion::Equals(v.clone()))
                        .unwrap_or(Criterion::Any);
                    (d.clone(), c)
                })
                .collect();
            let aggregated = from_frame(&agg.frame)?;
            let filtered = from_frame(&apply_filters(&agg.frame, &criteria)?)?;

            let chart = if has_active_selection(&criteria) {
                Some(Chart::Line(line_chart(&filtered, dims, &dataset.roles)?))
            } else {
                None
            };

            AnalysisView {
                aggregated,
                filtered,
                notice: chart.is_none().then(|| SELECT_VALUES_NOTICE.to_string()),
                chart,
                dropped: agg.dropped,
                date_range: None,
            }
        }
        ReportType::Comparison => {
            let range = effective_date_range(dataset, selections);
            let in_range = match range {
                Some(r) => filter_date_range(&dataset.frame, &dataset.date_column, r)?,
                None => dataset.frame.clone(),
            };
            let agg = group_sum(&in_range, dims, &measures)?;

            let criteria: Vec<(String, Criterion)> = dims
                .iter()
                .map(|d| {
                    let values = selections.comparison_filters.get(d).cloned().unwrap_or_default();
                    (d.clone(), Criterion::OneOf(values))
                })
                .collect();
            let aggregated = from_frame(&agg.frame)?;
            let filtered = from_frame(&apply_filters(&agg.frame, &criteria)?)?;

            let chart = if has_active_selection(&criteria) {
                Some(Chart::Bar(bar_chart(&filtered, dims, &dataset.roles)?))
            } else {
                None
            };

            AnalysisView {
                aggregated,
                filtered,
                notice: chart.is_none().then(|| SELECT_VALUES_NOTICE.to_string()),
                chart,
                dropped: agg.dropped,
                date_range: range,
            }
        }
    };

    Ok(AnalysisOutcome::Ready(view))
}

/// Comparison bounds: the user's range, else the full span of the date column.
pub fn effective_date_range(dataset: &Dataset, selections: &Selections) -> Option<DateRange> {
    if !dataset.date_ready() {
        return None;
    }
    selections
        .date_range
        .or_else(|| date_span(&dataset.frame, &dataset.date_column))
}

/// Values offered for filtering on `dimension`, in first-appearance order.
///
/// In Comparison mode only rows inside the date range are considered.
pub fn filter_options(dataset: &Dataset, selections: &Selections, dimension: &str) -> Vec<Value> {
    let source = match (selections.report, effective_date_range(dataset, selections)) {
        (ReportType::Comparison, Some(range)) => filter_date_range(&dataset.frame, &dataset.date_column, range),
        _ => Ok(dataset.frame.clone()),
    };
    let values = source.and_then(|frame| {
        let column = frame.select([dimension])?;
        from_frame(&column)
    });
    match values {
        Ok(table) => table
            .unique_values(dimension)
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnMarkers, Granularity};
    use crate::io::ingest::build_dataset;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        let table = Table::from_rows(columns.iter().map(|s| s.to_string()).collect(), rows);
        build_dataset(table, "sales.xlsx".into(), None, vec![], "CDATE", &ColumnMarkers::default()).unwrap()
    }

    fn sales() -> Dataset {
        dataset(
            &["CDATE", "RegionCd", "SalesAmt"],
            vec![
                vec![20230101.0.into(), "A".into(), 10.0.into()],
                vec![20230101.0.into(), "B".into(), 20.0.into()],
                vec![20230201.0.into(), "A".into(), 5.0.into()],
            ],
        )
    }

    fn visual_by_region_month() -> Selections {
        Selections {
            granularity: Granularity::Month,
            dimensions: vec!["RegionCd".to_string()],
            ..Selections::default()
        }
    }

    fn ready(outcome: AnalysisOutcome) -> AnalysisView {
        match outcome {
            AnalysisOutcome::Ready(view) => view,
            other => panic!("expected a ready analysis, got {other:?}"),
        }
    }

    #[test]
    fn visual_without_selection_shows_notice() {
        let view = ready(run_analysis(&sales(), &visual_by_region_month()).unwrap());

        assert_eq!(view.aggregated.len(), 3);
        assert_eq!(view.filtered, view.aggregated);
        assert_eq!(view.chart, None);
        assert_eq!(view.notice.as_deref(), Some(SELECT_VALUES_NOTICE));
    }

    #[test]
    fn visual_selection_filters_and_charts() {
        let mut selections = visual_by_region_month();
        selections.visual_filters.insert("RegionCd".into(), "A".into());
        let view = ready(run_analysis(&sales(), &selections).unwrap());

        assert_eq!(
            view.filtered.rows(),
            &[
                vec![Value::from("A"), Value::from("2023-01"), Value::Number(10.0)],
                vec![Value::from("A"), Value::from("2023-02"), Value::Number(5.0)],
            ]
        );
        let Some(Chart::Line(chart)) = view.chart else {
            panic!("expected a line chart");
        };
        assert_eq!(chart.categories, vec!["2023-01", "2023-02"]);
        assert_eq!(chart.series[0].values, vec![10.0, 5.0]);
        assert_eq!(view.notice, None);
    }

    #[test]
    fn filters_for_unselected_dimensions_are_ignored() {
        let mut selections = visual_by_region_month();
        selections.dimensions.clear();
        selections.visual_filters.insert("RegionCd".into(), "A".into());
        let view = ready(run_analysis(&sales(), &selections).unwrap());

        // Grouped by date label only.
        assert_eq!(view.aggregated.columns(), &["DateFilter".to_string(), "SalesAmt".to_string()]);
        assert_eq!(view.aggregated.len(), 2);
        assert!(view.chart.is_none());
    }

    #[test]
    fn comparison_uses_inclusive_range_then_groups_by_dimensions() {
        let selections = Selections {
            report: ReportType::Comparison,
            dimensions: vec!["RegionCd".to_string()],
            date_range: Some(DateRange {
                start: ymd(2023, 1, 1),
                end: ymd(2023, 1, 1),
            }),
            comparison_filters: [("RegionCd".to_string(), vec![Value::from("A"), Value::from("B")])]
                .into_iter()
                .collect(),
            ..Selections::default()
        };
        let view = ready(run_analysis(&sales(), &selections).unwrap());

        assert_eq!(
            view.aggregated.rows(),
            &[
                vec![Value::from("A"), Value::Number(10.0)],
                vec![Value::from("B"), Value::Number(20.0)],
            ]
        );
        let Some(Chart::Bar(chart)) = view.chart else {
            panic!("expected a bar chart");
        };
        assert_eq!(chart.categories, vec!["A", "B"]);
        assert_eq!(chart.series[0].values, vec![10.0, 20.0]);
    }

    #[test]
    fn comparison_defaults_to_full_span() {
        let selections = Selections {
            report: ReportType::Comparison,
            dimensions: vec!["RegionCd".to_string()],
            ..Selections::default()
        };
        let ds = sales();
        assert_eq!(
            effective_date_range(&ds, &selections),
            Some(DateRange {
                start: ymd(2023, 1, 1),
                end: ymd(2023, 2, 1),
            })
        );
        let view = ready(run_analysis(&ds, &selections).unwrap());
        assert_eq!(view.aggregated.rows()[0], vec![Value::from("A"), Value::Number(15.0)]);
        assert!(view.chart.is_none());
    }

    #[test]
    fn missing_date_column_disables_analysis() {
        let ds = dataset(&["RegionCd", "SalesAmt"], vec![vec!["A".into(), 1.0.into()]]);
        let outcome = run_analysis(&ds, &Selections::default()).unwrap();
        assert_eq!(
            outcome,
            AnalysisOutcome::Unavailable {
                reason: "The 'CDATE' column does not exist in the uploaded file.".to_string()
            }
        );
    }

    #[test]
    fn missing_measures_are_reported() {
        let ds = dataset(&["CDATE", "RegionCd"], vec![vec![20230101.0.into(), "A".into()]]);
        assert_eq!(
            run_analysis(&ds, &Selections::default()).unwrap(),
            AnalysisOutcome::MissingMeasures
        );
    }

    #[test]
    fn unknown_dimension_is_rejected() {
        let selections = Selections {
            dimensions: vec!["SalesAmt".to_string()],
            ..Selections::default()
        };
        assert_eq!(run_analysis(&sales(), &selections).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn filter_options_follow_the_date_range() {
        let ds = dataset(
            &["CDATE", "RegionCd", "SalesAmt"],
            vec![
                vec![20230101.0.into(), "B".into(), 1.0.into()],
                vec![20230201.0.into(), "A".into(), 1.0.into()],
                vec![20230301.0.into(), Value::Empty, 1.0.into()],
            ],
        );
        let mut selections = Selections::default();
        assert_eq!(
            filter_options(&ds, &selections, "RegionCd"),
            vec![Value::from("B"), Value::from("A")]
        );

        selections.report = ReportType::Comparison;
        selections.date_range = Some(DateRange {
            start: ymd(2023, 2, 1),
            end: ymd(2023, 3, 1),
        });
        assert_eq!(filter_options(&ds, &selections, "RegionCd"), vec![Value::from("A")]);
    }
}
