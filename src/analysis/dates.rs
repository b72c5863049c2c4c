//! Date coercion and granularity labels.
//!
//! The required date column arrives as `YYYYMMDD` numbers or strings. Coercion
//! is strict: exactly 8 ASCII digits forming a valid calendar date.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::domain::frame::days_to_date;
use crate::domain::{DATE_LABEL_COLUMN, DateRange, Granularity, Value};
use crate::error::AppError;

/// Coerce one cell from `YYYYMMDD` (number or text) to a date.
///
/// Cells that are already dates (workbook date cells) pass through.
pub fn parse_yyyymmdd(value: &Value) -> Result<NaiveDate, String> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Number(n) => {
            // Eight digits, no leading zero: 10000000..=99999999.
            if n.fract() != 0.0 || !(10_000_000.0..100_000_000.0).contains(n) {
                return Err(format!("Invalid date '{value}': expected YYYYMMDD."));
            }
            parse_compact(&(*n as i64).to_string())
        }
        Value::Text(s) => parse_compact(s.trim()),
        Value::Empty => Err("Missing date value.".to_string()),
    }
}

fn parse_compact(s: &str) -> Result<NaiveDate, String> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid date '{s}': expected YYYYMMDD."));
    }
    // All-ASCII was checked above, so byte slicing is safe.
    let year: i32 = s[0..4].parse().map_err(|e| format!("Invalid year in '{s}': {e}"))?;
    let month: u32 = s[4..6].parse().map_err(|e| format!("Invalid month in '{s}': {e}"))?;
    let day: u32 = s[6..8].parse().map_err(|e| format!("Invalid day in '{s}': {e}"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("Invalid date '{s}': not a calendar date."))
}

/// Lenient coercion used for user-chosen forecast columns: dates, `YYYYMMDD`,
/// or ISO `YYYY-MM-DD`.
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    if let Ok(d) = parse_yyyymmdd(value) {
        return Some(d);
    }
    match value {
        Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Append (or replace) the `DateFilter` column for `granularity`.
///
/// The date column must already be a `Date` column (see `io::ingest`).
pub fn with_date_labels(frame: &DataFrame, date_column: &str, granularity: Granularity) -> Result<DataFrame, AppError> {
    let dtype = frame
        .column(date_column)
        .map_err(|_| AppError::new(2, format!("Missing date column: `{date_column}`")))?
        .dtype();
    if *dtype != DataType::Date {
        return Err(AppError::new(
            3,
            format!("`{date_column}` holds {dtype} values, not dates."),
        ));
    }

    let labeled = frame
        .clone()
        .lazy()
        .with_column(
            col(date_column)
                .dt()
                .strftime(granularity.label_format())
                .alias(DATE_LABEL_COLUMN),
        )
        .collect()?;
    Ok(labeled)
}

/// First and last date present in a date column. `None` unless the column
/// holds dates.
pub fn date_span(frame: &DataFrame, date_column: &str) -> Option<DateRange> {
    if frame.column(date_column).ok()?.dtype() != &DataType::Date {
        return None;
    }
    let bounds = frame
        .clone()
        .lazy()
        .select([
            col(date_column).cast(DataType::Int32).min().alias("start"),
            col(date_column).cast(DataType::Int32).max().alias("end"),
        ])
        .collect()
        .ok()?;
    let day = |name: &str| -> Option<NaiveDate> {
        let days = bounds.column(name).ok()?.as_materialized_series().i32().ok()?.get(0)?;
        days_to_date(days)
    };
    Some(DateRange {
        start: day("start")?,
        end: day("end")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Table;
    use crate::domain::frame::{from_frame, to_frame};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_numeric_and_text_compact_dates() {
        assert_eq!(parse_yyyymmdd(&Value::Number(20230101.0)), Ok(ymd(2023, 1, 1)));
        assert_eq!(parse_yyyymmdd(&Value::from("20231231")), Ok(ymd(2023, 12, 31)));
        assert_eq!(parse_yyyymmdd(&Value::Date(ymd(2020, 2, 29))), Ok(ymd(2020, 2, 29)));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_yyyymmdd(&Value::from("2023-01-01")).is_err());
        assert!(parse_yyyymmdd(&Value::from("2023011")).is_err());
        assert!(parse_yyyymmdd(&Value::from("20230230")).is_err());
        assert!(parse_yyyymmdd(&Value::Number(20230101.5)).is_err());
        assert!(parse_yyyymmdd(&Value::from("0101")).is_err());
        assert!(parse_yyyymmdd(&Value::from("202301010")).is_err());
        assert!(parse_yyyymmdd(&Value::Number(f64::NAN)).is_err());
        assert!(parse_yyyymmdd(&Value::Empty).is_err());
    }

    #[test]
    fn numbers_need_exactly_eight_digits() {
        for n in [0.0, 101.0, 1230101.0, 230101.0, 202301011.0, -20230101.0] {
            let err = parse_yyyymmdd(&Value::Number(n)).unwrap_err();
            assert!(err.contains("expected YYYYMMDD"), "{n}: {err}");
        }
        assert_eq!(parse_yyyymmdd(&Value::Number(10000101.0)), Ok(ymd(1000, 1, 1)));
        assert_eq!(parse_yyyymmdd(&Value::Number(99991231.0)), Ok(ymd(9999, 12, 31)));
    }

    #[test]
    fn labels_per_granularity() {
        let d = ymd(2023, 2, 7);
        let label = |g: Granularity| d.format(g.label_format()).to_string();
        assert_eq!(label(Granularity::Day), "2023-02-07");
        assert_eq!(label(Granularity::Month), "2023-02");
        assert_eq!(label(Granularity::Year), "2023");
    }

    #[test]
    fn day_labels_round_trip() {
        let raw = ["20230101", "20231231", "20000229", "19991001"];
        for s in raw {
            let date = parse_yyyymmdd(&Value::from(s)).unwrap();
            let label = date.format(Granularity::Day.label_format()).to_string();
            let back = NaiveDate::parse_from_str(&label, "%Y-%m-%d").unwrap();
            assert_eq!(back, date);
            assert_eq!(back.format("%Y%m%d").to_string(), s);
        }
    }

    fn date_frame(dates: &[NaiveDate]) -> DataFrame {
        let table = Table::from_rows(vec!["CDATE".into()], dates.iter().map(|d| vec![Value::Date(*d)]).collect());
        to_frame(&table).unwrap()
    }

    #[test]
    fn date_labels_are_recomputed_per_granularity() {
        let frame = date_frame(&[ymd(2023, 1, 5), ymd(2024, 3, 9)]);
        let by_month = with_date_labels(&frame, "CDATE", Granularity::Month).unwrap();
        let by_year = with_date_labels(&by_month, "CDATE", Granularity::Year).unwrap();

        let labels = |f: &DataFrame| from_frame(f).unwrap().unique_values(DATE_LABEL_COLUMN);
        assert_eq!(labels(&by_month), vec![Value::from("2023-01"), Value::from("2024-03")]);
        assert_eq!(by_year.width(), 2);
        assert_eq!(labels(&by_year), vec![Value::from("2023"), Value::from("2024")]);
    }

    #[test]
    fn labels_need_a_date_column() {
        let table = Table::from_rows(vec!["CDATE".into()], vec![vec![20230101.0.into()]]);
        let frame = to_frame(&table).unwrap();
        assert_eq!(with_date_labels(&frame, "CDATE", Granularity::Day).unwrap_err().exit_code(), 3);
        assert_eq!(with_date_labels(&frame, "Nope", Granularity::Day).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn span_covers_min_and_max() {
        let frame = date_frame(&[ymd(2023, 5, 1), ymd(2023, 1, 1), ymd(2023, 3, 1)]);
        let span = date_span(&frame, "CDATE").unwrap();
        assert_eq!(span.start, ymd(2023, 1, 1));
        assert_eq!(span.end, ymd(2023, 5, 1));
        assert_eq!(date_span(&frame, "Nope"), None);

        let raw = to_frame(&Table::from_rows(vec!["CDATE".into()], vec![vec![20230101.0.into()]])).unwrap();
        assert_eq!(date_span(&raw, "CDATE"), None);
    }

    #[test]
    fn coerce_accepts_iso_text() {
        assert_eq!(coerce_date(&Value::from("2023-04-01")), Some(ymd(2023, 4, 1)));
        assert_eq!(coerce_date(&Value::from("April")), None);
    }
}
