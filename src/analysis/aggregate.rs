//! Grouped sums.
//!
//! Semantics follow a grouped-sum over numeric columns:
//! - one output row per distinct key combination, sorted by key
//! - rows with a null key cell are left out of every group
//! - only numeric measure columns are summed; nulls count as zero
//! - measures that are missing or not numeric are dropped and reported

use polars::prelude::*;

use crate::domain::frame::is_numeric;
use crate::error::AppError;

/// Output of [`group_sum`].
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Key columns followed by the summed measures.
    pub frame: DataFrame,
    /// Measures that were requested but not summed (missing or non-numeric).
    pub dropped: Vec<String>,
}

/// Group `frame` by `keys` and sum `measures`.
///
/// With no keys the whole frame collapses into a single totals row.
pub fn group_sum(frame: &DataFrame, keys: &[String], measures: &[String]) -> Result<Aggregation, AppError> {
    if let Some(missing) = keys.iter().find(|k| frame.column(k.as_str()).is_err()) {
        return Err(AppError::new(2, format!("Missing grouping column: `{missing}`")));
    }

    let (summed, dropped): (Vec<&String>, Vec<&String>) = measures
        .iter()
        .filter(|m| !keys.contains(*m))
        .partition(|m| is_numeric(frame, m));
    let sums: Vec<Expr> = summed.iter().map(|m| col(m.as_str()).sum()).collect();
    let dropped = dropped.into_iter().cloned().collect();

    if keys.is_empty() {
        let totals = if sums.is_empty() {
            DataFrame::empty()
        } else {
            frame.clone().lazy().select(sums).collect()?
        };
        return Ok(Aggregation { frame: totals, dropped });
    }

    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(k.as_str())).collect();
    let has_keys = keys
        .iter()
        .map(|k| col(k.as_str()).is_not_null())
        .reduce(|a, b| a.and(b))
        .unwrap_or(lit(true));
    let sort_by: Vec<&str> = keys.iter().map(String::as_str).collect();

    let grouped = frame
        .clone()
        .lazy()
        .filter(has_keys)
        .group_by_stable(key_exprs)
        .agg(sums)
        .sort(sort_by, SortMultipleOptions::default())
        .collect()?;

    Ok(Aggregation { frame: grouped, dropped })
}
