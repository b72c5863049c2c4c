//! In-memory table used by every stage of the pipeline.
//!
//! The table is row-oriented: ingest produces rows, previews and reports print
//! them, and charts read whole columns by name. Grouping and filtering run on
//! the Polars frame built from it (see `domain::frame`).

use std::fmt;

use chrono::NaiveDate;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

/// Named columns × rows of [`Value`]s.
///
/// Invariant: every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, padding short rows with `Empty` and
    /// truncating long ones.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over one column's cells. Empty iterator for unknown columns.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    /// Distinct values of a column in first-appearance order.
    pub fn unique_values(&self, name: &str) -> Vec<Value> {
        let mut out: Vec<Value> = Vec::new();
        for v in self.column_values(name) {
            if !out.contains(v) {
                out.push(v.clone());
            }
        }
        out
    }

    /// Replace the cells of an existing column in place.
    pub fn set_column(&mut self, idx: usize, values: Vec<Value>) {
        for (row, v) in self.rows.iter_mut().zip(values) {
            row[idx] = v;
        }
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}
