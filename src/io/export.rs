//! Export tables (aggregations, forecasts) to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::domain::Table;
use crate::error::AppError;

/// Write a table to a CSV file: header row, then one line per row.
///
/// Dates are written as `YYYY-MM-DD`, empty cells as empty fields.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(table.columns())
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;
    use chrono::NaiveDate;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::from_rows(
            vec!["RegionCd".into(), "CDATE".into(), "SalesAmt".into()],
            vec![
                vec!["A, north".into(), Value::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()), 10.0.into()],
                vec!["B".into(), Value::Empty, 2.5.into()],
            ],
        );

        write_table_csv(&path, &table).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "RegionCd,CDATE,SalesAmt\n\"A, north\",2023-01-01,10\nB,,2.5\n"
        );
    }

    #[test]
    fn unwritable_path_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = write_table_csv(&path, &Table::new(vec!["x".into()])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
