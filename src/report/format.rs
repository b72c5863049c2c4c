//! Formatted terminal output: tables, dataset summary, analysis and forecast.
//!
//! We keep formatting code in one place so:
//! - the analysis code stays clean and testable
//! - output changes are localized (golden tests below)

use crate::analysis::dates::date_span;
use crate::app::pipeline::{AnalysisOutcome, MISSING_MEASURES_MESSAGE};
use crate::domain::{Selections, Table, Value};
use crate::io::ingest::{Dataset, DateStatus};
use crate::services::forecast::ForecastTable;

/// Render a table as right-aligned text columns with a leading row index.
///
/// The first line is the header. An empty table renders as a short notice
/// listing its columns.
pub fn table_lines(table: &Table) -> Vec<String> {
    if table.is_empty() {
        return vec![
            "Empty table".to_string(),
            format!("Columns: [{}]", table.columns().join(", ")),
        ];
    }

    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let index_width = (table.len() - 1).to_string().len();
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            cells
                .iter()
                .map(|r| r[j].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(table.len() + 1);

    let mut header = " ".repeat(index_width);
    for (name, w) in table.columns().iter().zip(&widths) {
        header.push_str(&format!("  {name:>w$}"));
    }
    lines.push(header);

    for (i, row) in cells.iter().enumerate() {
        let mut line = format!("{i:<index_width$}");
        for (cell, w) in row.iter().zip(&widths) {
            line.push_str(&format!("  {cell:>w$}"));
        }
        lines.push(line);
    }

    lines
}

/// Text for one cell as it appears in [`table_lines`].
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Empty => "NaN".to_string(),
        other => other.to_string(),
    }
}

/// A table limited to `max_rows` rows, with a shape footer when cut.
pub fn format_table(table: &Table, max_rows: usize) -> String {
    let shown = if table.len() > max_rows { table.head(max_rows) } else { table.clone() };
    let mut out = table_lines(&shown).join("\n");
    out.push('\n');
    if table.len() > max_rows {
        out.push_str(&format!(
            "... ({} more rows)\n[{} rows x {} columns]\n",
            table.len() - max_rows,
            table.len(),
            table.columns().len()
        ));
    }
    out
}

/// Dataset overview: source, shape, date status and inferred column roles.
pub fn format_dataset_summary(dataset: &Dataset) -> String {
    let mut out = String::new();

    out.push_str("=== xplot - Excel Plotter ===\n");
    out.push_str(&format!("File: {}\n", dataset.display_name()));
    out.push_str(&format!(
        "Shape: {} rows x {} columns\n",
        dataset.table.len(),
        dataset.table.columns().len()
    ));

    match &dataset.date_status {
        DateStatus::Parsed => {
            let span = date_span(&dataset.frame, &dataset.date_column)
                .map(|r| format!("{} .. {}", r.start, r.end))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("Date column: {} ({span})\n", dataset.date_column));
        }
        DateStatus::Missing | DateStatus::Invalid(_) => {
            if let Some(msg) = dataset.date_message() {
                out.push_str(&format!("Date column: {msg}\n"));
            }
        }
    }

    let list = |v: &[String]| if v.is_empty() { "-".to_string() } else { v.join(", ") };
    out.push_str(&format!("Grouping columns: {}\n", list(&dataset.roles.grouping)));
    out.push_str(&format!("Amount columns:   {}\n", list(&dataset.roles.amount)));
    out.push_str(&format!("Quantity columns: {}\n", list(&dataset.roles.quantity)));

    if !dataset.skipped_rows.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", dataset.skipped_rows.len()));
        for err in dataset.skipped_rows.iter().take(5) {
            out.push_str(&format!("  line {}: {}\n", err.line, err.message));
        }
    }

    out
}

/// Selections, aggregated table and the chart notice (if any).
pub fn format_analysis(outcome: &AnalysisOutcome, selections: &Selections, max_rows: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("Report: {}", selections.report.display_name()));
    match selections.report {
        crate::domain::ReportType::Visual => {
            out.push_str(&format!(" | view by: {}", selections.granularity.display_name()));
        }
        crate::domain::ReportType::Comparison => {
            if let AnalysisOutcome::Ready(view) = outcome {
                if let Some(range) = view.date_range {
                    out.push_str(&format!(" | dates: {} .. {}", range.start, range.end));
                }
            }
        }
    }
    let dims = if selections.dimensions.is_empty() {
        "-".to_string()
    } else {
        selections.dimensions.join(", ")
    };
    out.push_str(&format!(" | analyse: {dims}\n"));

    match outcome {
        AnalysisOutcome::Unavailable { reason } => {
            out.push_str(&format!("Error: {reason}\n"));
        }
        AnalysisOutcome::MissingMeasures => {
            out.push_str(&format!("Error: {MISSING_MEASURES_MESSAGE}\n"));
        }
        AnalysisOutcome::Ready(view) => {
            if !view.dropped.is_empty() {
                out.push_str(&format!("Not summed (non-numeric): {}\n", view.dropped.join(", ")));
            }
            out.push_str("\nAggregated:\n");
            out.push_str(&format_table(&view.aggregated, max_rows));
            if let Some(notice) = &view.notice {
                out.push('\n');
                out.push_str(notice);
                out.push('\n');
            } else if view.filtered.len() != view.aggregated.len() {
                out.push_str("\nFiltered:\n");
                out.push_str(&format_table(&view.filtered, max_rows));
            }
        }
    }

    out
}

/// Forecast header plus the first and last `rows_each_side` rows.
pub fn format_forecast(forecast: &ForecastTable, rows_each_side: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Forecast: {} over {} | model: {} | history: {} points | future: {} days\n",
        forecast.value_column,
        forecast.date_column,
        forecast.model,
        forecast.history_len,
        forecast.future_rows().count()
    ));

    let table = forecast.to_table();
    let lines = table_lines(&table);
    let n = table.len();
    if n <= rows_each_side * 2 {
        out.push_str(&lines.join("\n"));
        out.push('\n');
        return out;
    }

    // Index 0 is the header; data rows are 1..=n.
    out.push_str(&lines[0]);
    out.push('\n');
    for line in &lines[1..=rows_each_side] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("...\n");
    for line in &lines[n + 1 - rows_each_side..] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("[{n} rows x {} columns]\n", table.columns().len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn table_lines_golden_snapshot() {
        let table = Table::from_rows(
            vec!["CDATE".into(), "RegionCd".into(), "SalesAmt".into()],
            vec![
                vec![Value::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()), "A".into(), 10.0.into()],
                vec![Value::Empty, "B".into(), 2.5.into()],
            ],
        );
        let expected = vec![
            "        CDATE  RegionCd  SalesAmt",
            "0  2023-01-01         A        10",
            "1         NaN         B       2.5",
        ];
        assert_eq!(table_lines(&table), expected);
    }

    #[test]
    fn empty_table_lists_columns() {
        let table = Table::new(vec!["A".into(), "B".into()]);
        assert_eq!(table_lines(&table), vec!["Empty table", "Columns: [A, B]"]);
    }

    #[test]
    fn long_tables_are_cut_with_shape_footer() {
        let table = Table::from_rows(
            vec!["SalesAmt".into()],
            (0..5).map(|i| vec![Value::Number(i as f64)]).collect(),
        );
        let text = format_table(&table, 2);
        assert!(text.ends_with("... (3 more rows)\n[5 rows x 1 columns]\n"));
        assert_eq!(text.lines().count(), 5);
    }
}
