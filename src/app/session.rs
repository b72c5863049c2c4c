//! In-memory session for one loaded file.
//!
//! The session owns the inputs (dataset + selections) and the derived state.
//! The analysis is memoized on the selections: asking for it again with the
//! same selections returns the cached outcome without recomputing.

use log::debug;

use crate::app::pipeline::{AnalysisOutcome, filter_options, run_analysis};
use crate::domain::{DateRange, Granularity, ReportType, Selections, Value};
use crate::error::AppError;
use crate::io::ingest::Dataset;
use crate::services::forecast::{ForecastTable, Forecaster, run_forecast};
use crate::services::qa::{Conversation, Exchange, TextCompletion, ask};

pub struct Session {
    dataset: Dataset,
    selections: Selections,
    cache: Option<(Selections, AnalysisOutcome)>,
    recomputes: usize,
    conversation: Conversation,
    forecast: Option<ForecastTable>,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            selections: Selections::default(),
            cache: None,
            recomputes: 0,
            conversation: Conversation::default(),
            forecast: None,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    pub fn set_selections(&mut self, selections: Selections) {
        self.selections = selections;
    }

    /// How many times the analysis actually ran.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    /// Current analysis, recomputed only when the selections changed.
    pub fn analysis(&mut self) -> Result<&AnalysisOutcome, AppError> {
        let stale = self.cache.as_ref().is_none_or(|(key, _)| *key != self.selections);
        if stale {
            let outcome = run_analysis(&self.dataset, &self.selections)?;
            self.recomputes += 1;
            debug!("analysis recomputed ({} times)", self.recomputes);
            self.cache = Some((self.selections.clone(), outcome));
        }
        self.cache
            .as_ref()
            .map(|(_, outcome)| outcome)
            .ok_or_else(|| AppError::new(4, "Analysis cache is empty."))
    }

    /// The memoized analysis, if it was computed for the current selections.
    pub fn cached_analysis(&self) -> Option<&AnalysisOutcome> {
        self.cache
            .as_ref()
            .filter(|(key, _)| *key == self.selections)
            .map(|(_, outcome)| outcome)
    }

    pub fn set_report(&mut self, report: ReportType) {
        self.selections.report = report;
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.selections.granularity = granularity;
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) -> Result<(), AppError> {
        if let Some(r) = range {
            if r.start > r.end {
                return Err(AppError::new(
                    2,
                    format!("Start date {} is after end date {}.", r.start, r.end),
                ));
            }
        }
        self.selections.date_range = range;
        Ok(())
    }

    /// Add or remove a grouping dimension. Removing one also clears its
    /// filters.
    pub fn toggle_dimension(&mut self, name: &str) {
        let dims = &mut self.selections.dimensions;
        if let Some(pos) = dims.iter().position(|d| d == name) {
            dims.remove(pos);
            self.selections.visual_filters.remove(name);
            self.selections.comparison_filters.remove(name);
        } else {
            dims.push(name.to_string());
        }
    }

    /// Visual mode: set or clear the single value for `dimension`.
    pub fn set_visual_filter(&mut self, dimension: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.selections.visual_filters.insert(dimension.to_string(), v);
            }
            None => {
                self.selections.visual_filters.remove(dimension);
            }
        }
    }

    /// Comparison mode: add `value` to the set for `dimension`, or remove it.
    pub fn toggle_comparison_value(&mut self, dimension: &str, value: Value) {
        let set = self
            .selections
            .comparison_filters
            .entry(dimension.to_string())
            .or_default();
        if let Some(pos) = set.iter().position(|v| *v == value) {
            set.remove(pos);
        } else {
            set.push(value);
        }
        if set.is_empty() {
            self.selections.comparison_filters.remove(dimension);
        }
    }

    pub fn filter_options(&self, dimension: &str) -> Vec<Value> {
        filter_options(&self.dataset, &self.selections, dimension)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Ask a question about the full dataset and log the exchange.
    pub fn ask(
        &mut self,
        completer: &dyn TextCompletion,
        question: &str,
        max_context_chars: usize,
    ) -> Result<&Exchange, AppError> {
        let exchange = ask(completer, &self.dataset.table, question, max_context_chars)?;
        self.conversation.push(exchange);
        self.conversation
            .last()
            .ok_or_else(|| AppError::new(4, "Conversation is empty."))
    }

    pub fn forecast(&self) -> Option<&ForecastTable> {
        self.forecast.as_ref()
    }

    /// Forecast `value_column` over `date_column` and keep the result.
    pub fn run_forecast(
        &mut self,
        forecaster: &dyn Forecaster,
        date_column: &str,
        value_column: &str,
    ) -> Result<&ForecastTable, AppError> {
        let table = run_forecast(forecaster, &self.dataset.table, date_column, value_column)?;
        Ok(self.forecast.insert(table))
    }
}
