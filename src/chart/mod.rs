//! Chart models built from the filtered table.
//!
//! A chart here is plain data (categories + numeric series). Rendering lives
//! elsewhere: `tui::chart_widget` draws with Plotters, `plot::ascii` draws text.

use crate::analysis::ColumnRoles;
use crate::domain::{DATE_LABEL_COLUMN, Table, Value};
use crate::error::AppError;

/// Which y-axis a series is plotted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Amount-like measures.
    Left,
    /// Quantity-like measures.
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub axis: Axis,
    /// One value per chart category.
    pub values: Vec<f64>,
}

/// Visual mode: dual-axis line chart over date labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_title: String,
    pub left_title: String,
    pub right_title: String,
    /// Date labels in chronological order.
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl LineChart {
    pub fn has_right_axis(&self) -> bool {
        self.series.iter().any(|s| s.axis == Axis::Right)
    }
}

/// Comparison mode: grouped bars per first-dimension value.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Line(LineChart),
    Bar(BarChart),
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Line(c) => &c.title,
            Chart::Bar(c) => &c.title,
        }
    }
}

/// Build the Visual-mode line chart.
///
/// Rows sharing a date label (several dimension combinations passing the
/// filter) are summed so each label appears once on the x-axis.
pub fn line_chart(filtered: &Table, dimensions: &[String], roles: &ColumnRoles) -> Result<LineChart, AppError> {
    let label_idx = filtered.column_index(DATE_LABEL_COLUMN).ok_or_else(|| {
        AppError::new(3, format!("Aggregated table has no `{DATE_LABEL_COLUMN}` column."))
    })?;

    let mut categories: Vec<String> = filtered
        .column_values(DATE_LABEL_COLUMN)
        .map(Value::to_string)
        .collect();
    // Labels are ISO-shaped (YYYY, YYYY-MM, YYYY-MM-DD), so string order is
    // chronological.
    categories.sort();
    categories.dedup();

    let mut series = Vec::new();
    for (names, axis) in [(&roles.amount, Axis::Left), (&roles.quantity, Axis::Right)] {
        // A dimension column is a key here, never a plotted measure.
        for name in names.iter().filter(|n| !dimensions.contains(*n)) {
            let Some(idx) = filtered.column_index(name) else {
                continue;
            };
            let values = sum_by_category(filtered, label_idx, idx, &categories);
            series.push(Series {
                name: name.clone(),
                axis,
                values,
            });
        }
    }

    Ok(LineChart {
        title: format!("Values by {} and Date", dimensions.join(", ")),
        x_title: "Date".to_string(),
        left_title: "Amt".to_string(),
        right_title: "Qty".to_string(),
        categories,
        series,
    })
}

/// Build the Comparison-mode grouped bar chart.
///
/// Categories are the first dimension's values in row order; rows repeating a
/// value (other dimensions differ) are summed into one bar group.
pub fn bar_chart(filtered: &Table, dimensions: &[String], roles: &ColumnRoles) -> Result<BarChart, AppError> {
    let first = dimensions
        .first()
        .ok_or_else(|| AppError::new(2, "A comparison chart needs at least one dimension."))?;
    let key_idx = filtered
        .column_index(first)
        .ok_or_else(|| AppError::new(3, format!("Aggregated table has no `{first}` column.")))?;

    let categories: Vec<String> = filtered
        .unique_values(first)
        .iter()
        .map(Value::to_string)
        .collect();

    let mut series: Vec<Series> = Vec::new();
    for (names, axis) in [(&roles.amount, Axis::Left), (&roles.quantity, Axis::Left)] {
        for name in names.iter().filter(|n| !dimensions.contains(*n)) {
            if series.iter().any(|s| &s.name == name) {
                continue;
            }
            let Some(idx) = filtered.column_index(name) else {
                continue;
            };
            series.push(Series {
                name: name.clone(),
                axis,
                values: sum_by_category(filtered, key_idx, idx, &categories),
            });
        }
    }

    Ok(BarChart {
        title: format!("Comparison by {}", dimensions.join(", ")),
        x_title: first.clone(),
        y_title: "Values".to_string(),
        categories,
        series,
    })
}

fn sum_by_category(table: &Table, key_idx: usize, value_idx: usize, categories: &[String]) -> Vec<f64> {
    let mut sums = vec![0.0; categories.len()];
    for row in table.rows() {
        let key = row[key_idx].to_string();
        if let Some(pos) = categories.iter().position(|c| *c == key) {
            sums[pos] += row[value_idx].as_f64().unwrap_or(0.0);
        }
    }
    sums
}

/// Min/max over the given series (ignoring non-finite values).
///
/// Returns `None` when there is nothing to plot.
pub fn value_bounds<'a>(series: impl Iterator<Item = &'a Series>) -> Option<(f64, f64)> {
    let mut bounds: Option<(f64, f64)> = None;
    for v in series.flat_map(|s| s.values.iter().copied()).filter(|v| v.is_finite()) {
        bounds = Some(match bounds {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        });
    }
    bounds
}

/// Widen degenerate bounds and add a small margin.
pub fn padded_bounds((lo, hi): (f64, f64)) -> (f64, f64) {
    if (hi - lo).abs() < 1e-12 {
        let pad = if lo.abs() > 1.0 { lo.abs() * 0.1 } else { 1.0 };
        return (lo - pad, hi + pad);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}
