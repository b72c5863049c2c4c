//! Workbook/CSV ingest and date validation.
//!
//! This module turns an uploaded file into a [`Dataset`]: a typed [`Table`],
//! its Polars frame, and what we learned about it (date column status, column
//! roles).
//!
//! Design goals:
//! - **Keep the data viewable**: a missing or malformed date column is reported
//!   on the dataset, it never fails the load
//! - **Row-level reporting**: every malformed date is reported with its line
//! - **Deterministic behavior**: first sheet unless one is named explicitly

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Days, NaiveDate};
use log::{info, warn};
use polars::prelude::DataFrame;

use crate::analysis::classify::{ColumnRoles, classify_columns};
use crate::analysis::dates::parse_yyyymmdd;
use crate::domain::frame::to_frame;
use crate::domain::{ColumnMarkers, LoadOptions, Table, Value};
use crate::error::AppError;

/// File extensions we know how to read.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

/// A row-level problem found during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line in the source (the header is line 1).
    pub line: usize,
    pub message: String,
}

/// State of the required date column after ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum DateStatus {
    /// Present and every cell converted to a date.
    Parsed,
    /// The column does not exist.
    Missing,
    /// Present, but at least one cell is not a valid `YYYYMMDD` date.
    Invalid(Vec<RowError>),
}

/// Ingest output: the table plus what was inferred about it.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: PathBuf,
    /// Sheet the table was read from (workbooks only).
    pub sheet: Option<String>,
    pub table: Table,
    /// The same cells as `table`, one dtype per column; analysis runs on this.
    pub frame: DataFrame,
    pub date_column: String,
    pub date_status: DateStatus,
    pub roles: ColumnRoles,
    /// Rows the reader could not parse at all (CSV only).
    pub skipped_rows: Vec<RowError>,
}

impl Dataset {
    /// Date-dependent features (granularity labels, date range, both report
    /// modes) are only available when this is true.
    pub fn date_ready(&self) -> bool {
        self.date_status == DateStatus::Parsed
    }

    /// User-visible explanation when the date column is unusable.
    pub fn date_message(&self) -> Option<String> {
        match &self.date_status {
            DateStatus::Parsed => None,
            DateStatus::Missing => Some(format!(
                "The '{}' column does not exist in the uploaded file.",
                self.date_column
            )),
            DateStatus::Invalid(errors) => {
                let first = errors
                    .first()
                    .map(|e| format!(" First: line {}: {}", e.line, e.message))
                    .unwrap_or_default();
                Some(format!(
                    "The '{}' column has {} value(s) that are not YYYYMMDD dates.{first}",
                    self.date_column,
                    errors.len()
                ))
            }
        }
    }

    pub fn display_name(&self) -> String {
        let file = self
            .source
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string());
        match &self.sheet {
            Some(sheet) => format!("{file} [{sheet}]"),
            None => file,
        }
    }
}

/// Load a workbook or CSV file.
pub fn load_dataset(options: &LoadOptions) -> Result<Dataset, AppError> {
    let path = options.path.as_path();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let (table, sheet, skipped_rows) = match ext.as_str() {
        "csv" => {
            let (table, skipped) = read_csv_table(path)?;
            (table, None, skipped)
        }
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => {
            let (table, sheet) = read_workbook_table(path, options.sheet.as_deref())?;
            (table, Some(sheet), Vec::new())
        }
        _ => {
            return Err(AppError::new(
                2,
                format!(
                    "Unsupported file type '{}'. Expected one of: {}.",
                    path.display(),
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            ));
        }
    };

    let dataset = build_dataset(table, path.to_path_buf(), sheet, skipped_rows, &options.date_column, &options.markers)?;

    info!(
        "loaded {} rows x {} columns from {}",
        dataset.table.len(),
        dataset.table.columns().len(),
        dataset.display_name()
    );
    if let Some(msg) = dataset.date_message() {
        warn!("{msg}");
    }

    Ok(dataset)
}

/// Validate the date column, infer column roles and build the frame for an
/// already-read table.
pub fn build_dataset(
    mut table: Table,
    source: PathBuf,
    sheet: Option<String>,
    skipped_rows: Vec<RowError>,
    date_column: &str,
    markers: &ColumnMarkers,
) -> Result<Dataset, AppError> {
    let date_status = coerce_date_column(&mut table, date_column);
    let roles = classify_columns(table.columns(), date_column, markers);
    let frame = to_frame(&table)?;

    Ok(Dataset {
        source,
        sheet,
        table,
        frame,
        date_column: date_column.to_string(),
        date_status,
        roles,
        skipped_rows,
    })
}

/// Convert the date column in place. The column is left untouched unless every
/// cell converts.
fn coerce_date_column(table: &mut Table, date_column: &str) -> DateStatus {
    let Some(idx) = table.column_index(date_column) else {
        return DateStatus::Missing;
    };

    let mut dates = Vec::with_capacity(table.len());
    let mut errors = Vec::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        match parse_yyyymmdd(&row[idx]) {
            Ok(d) => dates.push(Value::Date(d)),
            Err(message) => errors.push(RowError {
                // +2: 0-based rows plus the header line.
                line: row_idx + 2,
                message,
            }),
        }
    }

    if !errors.is_empty() {
        return DateStatus::Invalid(errors);
    }

    table.set_column(idx, dates);
    DateStatus::Parsed
}

fn read_workbook_table(path: &Path, sheet: Option<&str>) -> Result<(Table, String), AppError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AppError::new(2, format!("Failed to open workbook '{}': {e}", path.display())))?;

    let names: Vec<String> = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| {
                AppError::new(
                    2,
                    format!("Sheet '{wanted}' not found. Available: {}.", names.join(", ")),
                )
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| AppError::new(2, "Workbook contains no sheets."))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| AppError::new(2, format!("Failed to read sheet '{name}': {e}")))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| AppError::new(3, format!("Sheet '{name}' is empty.")))?;
    let columns = normalize_headers(header.iter().map(|c| cell_to_value(c).to_string()));

    let mut table = Table::new(columns);
    for row in rows {
        let values: Vec<Value> = row.iter().map(cell_to_value).collect();
        if values.iter().all(Value::is_empty) {
            continue;
        }
        table.push_row(values);
    }

    Ok((table, name))
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => {
            if s.trim().is_empty() {
                Value::Empty
            } else {
                Value::Text(s.clone())
            }
        }
        Data::Bool(b) => Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial)
                .map(Value::Date)
                .unwrap_or(Value::Number(serial))
        }
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Value::Date)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(format!("#{e:?}")),
    }
}

/// Excel 1900 date system: serial 1 is 1900-01-01, with the historical
/// leap-day bug folded into the 1899-12-30 epoch.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

fn read_csv_table(path: &Path) -> Result<(Table, Vec<RowError>), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let mut table = Table::new(normalize_headers(headers.iter().map(str::to_string)));
    let mut skipped = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header and lines are 1-based.
        let line = idx + 2;
        match result {
            Ok(record) => {
                let values: Vec<Value> = record.iter().map(parse_csv_cell).collect();
                if values.iter().all(Value::is_empty) {
                    continue;
                }
                table.push_row(values);
            }
            Err(e) => skipped.push(RowError {
                line,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    Ok((table, skipped))
}

fn parse_csv_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Empty;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Number(v),
        _ => Value::Text(raw.to_string()),
    }
}

/// Clean header names: strip a UTF-8 BOM and surrounding whitespace, name
/// blank headers `Unnamed: <idx>`, and suffix duplicates with `.1`, `.2`, ...
fn normalize_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on
        // the first header; without stripping it `CDATE` would not be found.
        let name = name.trim_start_matches('\u{feff}').trim().to_string();
        let base = if name.is_empty() { format!("Unnamed: {idx}") } else { name };

        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}
