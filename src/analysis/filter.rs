//! Dimension filters and the Comparison-mode date range.

use polars::prelude::*;

use crate::domain::frame::{date_to_days, value_lit, value_series};
use crate::domain::{DateRange, Value};
use crate::error::AppError;

/// Constraint on one dimension column.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// No constraint.
    Any,
    /// Exact match (Visual mode).
    Equals(Value),
    /// Set membership (Comparison mode); an empty set is no constraint.
    OneOf(Vec<Value>),
}

impl Criterion {
    pub fn is_active(&self) -> bool {
        match self {
            Criterion::Any => false,
            Criterion::Equals(_) => true,
            Criterion::OneOf(values) => !values.is_empty(),
        }
    }

    /// Predicate on `column` (of `dtype`); `None` when inactive.
    fn predicate(&self, column: &str, dtype: &DataType) -> Result<Option<Expr>, AppError> {
        let expr = match self {
            Criterion::Any => return Ok(None),
            Criterion::OneOf(values) if values.is_empty() => return Ok(None),
            Criterion::Equals(value) => col(column).eq(value_lit(dtype, value)),
            Criterion::OneOf(values) => col(column).is_in(lit(value_series(dtype, values)?)),
        };
        Ok(Some(expr))
    }
}

/// True when at least one dimension has a value selected.
pub fn has_active_selection(criteria: &[(String, Criterion)]) -> bool {
    criteria.iter().any(|(_, c)| c.is_active())
}

/// Keep rows matching every active criterion.
///
/// With no active criterion the input is returned unchanged.
pub fn apply_filters(frame: &DataFrame, criteria: &[(String, Criterion)]) -> Result<DataFrame, AppError> {
    let mut predicate: Option<Expr> = None;
    for (column, criterion) in criteria.iter().filter(|(_, c)| c.is_active()) {
        let dtype = frame
            .column(column)
            .map_err(|_| AppError::new(2, format!("Filter column `{column}` is not in the table.")))?
            .dtype();
        if let Some(expr) = criterion.predicate(column, dtype)? {
            predicate = Some(match predicate {
                Some(acc) => acc.and(expr),
                None => expr,
            });
        }
    }

    match predicate {
        Some(expr) => Ok(frame.clone().lazy().filter(expr).collect()?),
        None => Ok(frame.clone()),
    }
}

/// Keep rows whose date lies inside `range`, both bounds included.
///
/// Rows without a date are dropped.
pub fn filter_date_range(frame: &DataFrame, date_column: &str, range: DateRange) -> Result<DataFrame, AppError> {
    if range.start > range.end {
        return Err(AppError::new(
            2,
            format!("Start date {} is after end date {}.", range.start, range.end),
        ));
    }
    if frame.column(date_column).is_err() {
        return Err(AppError::new(2, format!("Missing date column: `{date_column}`")));
    }

    let day = col(date_column).cast(DataType::Int32);
    let in_range = day
        .clone()
        .gt_eq(lit(date_to_days(range.start)))
        .and(day.lt_eq(lit(date_to_days(range.end))));
    Ok(frame.clone().lazy().filter(in_range).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Table;
    use crate::domain::frame::{from_frame, to_frame};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn aggregated() -> DataFrame {
        to_frame(&Table::from_rows(
            vec!["RegionCd".into(), "DateFilter".into(), "SalesAmt".into()],
            vec![
                vec!["A".into(), "2023-01".into(), 10.0.into()],
                vec!["A".into(), "2023-02".into(), 5.0.into()],
                vec!["B".into(), "2023-01".into(), 20.0.into()],
            ],
        ))
        .unwrap()
    }

    fn table(frame: &DataFrame) -> Table {
        from_frame(frame).unwrap()
    }

    #[test]
    fn no_selection_is_a_no_op() {
        let frame = aggregated();
        let criteria = vec![
            ("RegionCd".to_string(), Criterion::Any),
            ("DateFilter".to_string(), Criterion::OneOf(vec![])),
        ];
        assert!(!has_active_selection(&criteria));
        assert!(apply_filters(&frame, &criteria).unwrap().equals(&frame));
        assert!(apply_filters(&frame, &[]).unwrap().equals(&frame));
    }

    #[test]
    fn exact_match_keeps_only_selected_value() {
        let criteria = vec![("RegionCd".to_string(), Criterion::Equals("A".into()))];
        assert!(has_active_selection(&criteria));

        let out = table(&apply_filters(&aggregated(), &criteria).unwrap());
        assert_eq!(out.len(), 2);
        assert!(out.column_values("RegionCd").all(|v| *v == Value::from("A")));
    }

    #[test]
    fn set_membership_across_dimensions() {
        let criteria = vec![
            ("RegionCd".to_string(), Criterion::OneOf(vec!["A".into(), "B".into()])),
            ("DateFilter".to_string(), Criterion::OneOf(vec!["2023-01".into()])),
        ];
        let out = table(&apply_filters(&aggregated(), &criteria).unwrap());
        assert_eq!(out.unique_values("RegionCd"), vec![Value::from("A"), Value::from("B")]);
        assert_eq!(out.unique_values("DateFilter"), vec![Value::from("2023-01")]);
    }

    #[test]
    fn numeric_dimension_matches_by_value() {
        let frame = to_frame(&Table::from_rows(
            vec!["StoreCd".into(), "SalesAmt".into()],
            vec![vec![7.0.into(), 1.0.into()], vec![8.0.into(), 2.0.into()]],
        ))
        .unwrap();
        let equals = vec![("StoreCd".to_string(), Criterion::Equals(8.0.into()))];
        assert_eq!(table(&apply_filters(&frame, &equals).unwrap()).rows(), &[vec![8.0.into(), 2.0.into()]]);

        let one_of = vec![("StoreCd".to_string(), Criterion::OneOf(vec![7.0.into(), 9.0.into()]))];
        assert_eq!(table(&apply_filters(&frame, &one_of).unwrap()).rows(), &[vec![7.0.into(), 1.0.into()]]);
    }

    #[test]
    fn unknown_filter_column_errors_only_when_active() {
        let idle = vec![("Nope".to_string(), Criterion::Any)];
        assert!(apply_filters(&aggregated(), &idle).is_ok());

        let active = vec![("Nope".to_string(), Criterion::Equals("x".into()))];
        assert!(apply_filters(&aggregated(), &active).is_err());
    }

    #[test]
    fn date_range_keeps_both_bounds() {
        let frame = to_frame(&Table::from_rows(
            vec!["CDATE".into(), "SalesAmt".into()],
            vec![
                vec![Value::Date(date(2022, 12, 31)), 1.0.into()],
                vec![Value::Date(date(2023, 1, 1)), 2.0.into()],
                vec![Value::Date(date(2023, 1, 15)), 3.0.into()],
                vec![Value::Date(date(2023, 1, 31)), 4.0.into()],
                vec![Value::Date(date(2023, 2, 1)), 5.0.into()],
            ],
        ))
        .unwrap();
        let range = DateRange {
            start: date(2023, 1, 1),
            end: date(2023, 1, 31),
        };
        let out = table(&filter_date_range(&frame, "CDATE", range).unwrap());
        let kept: Vec<f64> = out.column_values("SalesAmt").filter_map(Value::as_f64).collect();
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let frame = to_frame(&Table::new(vec!["CDATE".into()])).unwrap();
        let range = DateRange {
            start: date(2023, 2, 1),
            end: date(2023, 1, 1),
        };
        assert!(filter_date_range(&frame, "CDATE", range).is_err());
    }
}
