//! Bridge between the cell-level [`Table`] and a Polars [`DataFrame`].
//!
//! Ingest and display work on `Table`; grouping, filtering and date labels run
//! on the frame. Each column gets one dtype:
//! - `Float64` when every non-empty cell is a number (or the column is empty)
//! - `Date` when every non-empty cell is a date
//! - `String` otherwise, using the cell's display text
//!
//! Empty cells become nulls.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::domain::{Table, Value};
use crate::error::AppError;

/// `NaiveDate::num_days_from_ce` of 1970-01-01; Polars dates count days from there.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Number,
    Date,
    Text,
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a Value>) -> Kind {
    let mut kind: Option<Kind> = None;
    for cell in cells {
        let this = match cell {
            Value::Empty => continue,
            Value::Number(_) => Kind::Number,
            Value::Date(_) => Kind::Date,
            Value::Text(_) => return Kind::Text,
        };
        match kind {
            None => kind = Some(this),
            Some(k) if k != this => return Kind::Text,
            Some(_) => {}
        }
    }
    kind.unwrap_or(Kind::Number)
}

/// Build a frame with one typed column per table column.
pub fn to_frame(table: &Table) -> Result<DataFrame, AppError> {
    let mut columns = Vec::with_capacity(table.columns().len());
    for name in table.columns() {
        let cells = || table.column_values(name);
        let column = match column_kind(cells()) {
            Kind::Number => {
                let values: Vec<Option<f64>> = cells().map(Value::as_f64).collect();
                Column::new(name.as_str().into(), &values)
            }
            Kind::Date => {
                let days: Vec<Option<i32>> = cells().map(|v| v.as_date().map(date_to_days)).collect();
                Column::new(name.as_str().into(), &days).cast(&DataType::Date)?
            }
            Kind::Text => {
                let text: Vec<Option<String>> = cells()
                    .map(|v| (!v.is_empty()).then(|| v.to_string()))
                    .collect();
                Column::new(name.as_str().into(), &text)
            }
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

/// Read a frame back into cells, column by column.
pub fn from_frame(frame: &DataFrame) -> Result<Table, AppError> {
    let names: Vec<String> = frame
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut rows = vec![Vec::with_capacity(names.len()); frame.height()];

    for column in frame.get_columns() {
        let series = column.as_materialized_series();
        let cells: Vec<Value> = match series.dtype() {
            DataType::Date => series
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .map(|d| d.and_then(days_to_date).map_or(Value::Empty, Value::Date))
                .collect(),
            DataType::String => series
                .str()?
                .into_iter()
                .map(|s| s.map_or(Value::Empty, Value::from))
                .collect(),
            dtype if dtype.is_float() || dtype.is_integer() => series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.map_or(Value::Empty, Value::Number))
                .collect(),
            _ => series
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|s| s.map_or(Value::Empty, Value::from))
                .collect(),
        };
        for (row, cell) in rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    Ok(Table::from_rows(names, rows))
}

/// True when the frame's column holds numbers Polars can sum.
pub fn is_numeric(frame: &DataFrame, name: &str) -> bool {
    frame
        .column(name)
        .is_ok_and(|c| c.dtype().is_float() || c.dtype().is_integer())
}

/// Literal for `value` in a column of `dtype`.
///
/// Text columns compare against the cell's display text, so a number picked
/// from a mixed column still matches.
pub fn value_lit(dtype: &DataType, value: &Value) -> Expr {
    match (dtype, value) {
        (_, Value::Empty) => lit(NULL),
        (DataType::String, v) => lit(v.to_string()),
        (DataType::Date, Value::Date(d)) => lit(date_to_days(*d)).cast(DataType::Date),
        (_, Value::Number(n)) => lit(*n),
        (_, v) => lit(v.to_string()),
    }
}

/// A typed series of `values` for `is_in` against a column of `dtype`.
pub fn value_series(dtype: &DataType, values: &[Value]) -> Result<Series, AppError> {
    let name: PlSmallStr = "values".into();
    let series = match dtype {
        DataType::Date => {
            let days: Vec<Option<i32>> = values.iter().map(|v| v.as_date().map(date_to_days)).collect();
            Series::new(name, &days).cast(&DataType::Date)?
        }
        DataType::String => {
            let text: Vec<String> = values.iter().map(Value::to_string).collect();
            Series::new(name, &text)
        }
        _ => {
            let numbers: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
            Series::new(name, &numbers)
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mixed() -> Table {
        Table::from_rows(
            vec!["CDATE".into(), "StoreCd".into(), "SalesAmt".into()],
            vec![
                vec![ymd(2023, 1, 5).into(), 7.0.into(), 1.5.into()],
                vec![ymd(2024, 3, 9).into(), "S2".into(), Value::Empty],
            ],
        )
    }

    #[test]
    fn columns_get_one_dtype_each() {
        let frame = to_frame(&mixed()).unwrap();
        let dtypes: Vec<DataType> = frame.dtypes();
        assert_eq!(dtypes, vec![DataType::Date, DataType::String, DataType::Float64]);
        assert!(is_numeric(&frame, "SalesAmt"));
        assert!(!is_numeric(&frame, "StoreCd"));
        assert!(!is_numeric(&frame, "Nope"));
    }

    #[test]
    fn cells_come_back_with_mixed_columns_as_text() {
        let table = from_frame(&to_frame(&mixed()).unwrap()).unwrap();
        assert_eq!(table.columns(), mixed().columns());
        assert_eq!(
            table.rows(),
            &[
                vec![ymd(2023, 1, 5).into(), "7".into(), 1.5.into()],
                vec![ymd(2024, 3, 9).into(), "S2".into(), Value::Empty],
            ]
        );
    }

    #[test]
    fn epoch_offset_matches_polars_dates() {
        assert_eq!(date_to_days(ymd(1970, 1, 1)), 0);
        assert_eq!(date_to_days(ymd(1970, 1, 2)), 1);
        assert_eq!(days_to_date(-1), Some(ymd(1969, 12, 31)));
    }
}
