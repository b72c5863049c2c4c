//! Shared domain types.
//!
//! These are the knobs a user turns (report type, granularity, selections) and
//! the settings the external services are built from. They are plain data so
//! the CLI, the TUI and the session can all construct them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Value;

/// Name of the derived date-label column.
pub const DATE_LABEL_COLUMN: &str = "DateFilter";

/// Default name of the required date column.
pub const DEFAULT_DATE_COLUMN: &str = "CDATE";

/// Which report the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Time series: group by dimensions + date label, dual-axis line chart.
    Visual,
    /// Cross-section over a date range: group by dimensions, grouped bars.
    Comparison,
}

impl ReportType {
    pub const ALL: [ReportType; 2] = [ReportType::Visual, ReportType::Comparison];

    pub fn display_name(self) -> &'static str {
        match self {
            ReportType::Visual => "Data Visual",
            ReportType::Comparison => "Comparison",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ReportType::Visual => ReportType::Comparison,
            ReportType::Comparison => ReportType::Visual,
        }
    }
}

/// Date granularity used for the `DateFilter` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Month, Granularity::Year];

    pub fn display_name(self) -> &'static str {
        match self {
            Granularity::Day => "Day",
            Granularity::Month => "Month",
            Granularity::Year => "Year",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Granularity::Day => Granularity::Month,
            Granularity::Month => Granularity::Year,
            Granularity::Year => Granularity::Day,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Granularity::Day => Granularity::Year,
            Granularity::Month => Granularity::Day,
            Granularity::Year => Granularity::Month,
        }
    }

    /// `strftime` pattern for the `DateFilter` label.
    pub fn label_format(self) -> &'static str {
        match self {
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
            Granularity::Year => "%Y",
        }
    }
}

/// Inclusive date bounds for Comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Substring markers used to infer column roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMarkers {
    pub grouping: Vec<String>,
    pub amount: Vec<String>,
    pub quantity: Vec<String>,
}

impl Default for ColumnMarkers {
    fn default() -> Self {
        Self {
            grouping: vec!["Cd".to_string(), "Logistic".to_string(), "Cn".to_string()],
            amount: vec!["Amt".to_string()],
            quantity: vec!["Qty".to_string()],
        }
    }
}

/// Everything the user has chosen on the analysis controls.
///
/// Used as the memoization key of the session: when this value is unchanged,
/// the derived analysis is reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Selections {
    pub report: ReportType,
    pub granularity: Granularity,
    /// Selected grouping dimensions, in selection order.
    pub dimensions: Vec<String>,
    /// Visual mode: one value per dimension (absent = no constraint).
    pub visual_filters: BTreeMap<String, Value>,
    /// Comparison mode: a set of values per dimension (empty = no constraint).
    pub comparison_filters: BTreeMap<String, Vec<Value>>,
    /// Comparison mode bounds; `None` means the full span of the date column.
    pub date_range: Option<DateRange>,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            report: ReportType::Visual,
            granularity: Granularity::Day,
            dimensions: Vec::new(),
            visual_filters: BTreeMap::new(),
            comparison_filters: BTreeMap::new(),
            date_range: None,
        }
    }
}

/// Options controlling how a file is read and interpreted.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub path: PathBuf,
    /// Workbook sheet to read (first sheet when `None`).
    pub sheet: Option<String>,
    pub date_column: String,
    pub markers: ColumnMarkers,
}

/// Settings for the external collaborators.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Per-request timeout for both services.
    pub timeout: Duration,
    /// Remote forecast endpoint; the local additive model is used when unset.
    pub forecast_url: Option<String>,
    pub qa: QaSettings,
}

/// Text-completion settings.
#[derive(Debug, Clone)]
pub struct QaSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on the serialized dataset placed in the prompt.
    pub max_context_chars: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            forecast_url: None,
            qa: QaSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo-instruct".to_string(),
                max_tokens: 150,
                max_context_chars: 12_000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let range = DateRange { start, end };
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end.succ_opt().unwrap()));
        assert!(!range.contains(start.pred_opt().unwrap()));
    }

    #[test]
    fn granularity_cycles() {
        for g in Granularity::ALL {
            assert_eq!(g.next().prev(), g);
        }
    }
}
