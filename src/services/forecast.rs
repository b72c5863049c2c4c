//! Time-series forecast over two user-chosen columns.
//!
//! The forecast model is a collaborator behind the [`Forecaster`] trait:
//! it is given a `(ds, y)` series and returns one row per history date plus
//! one row per future day.
//!
//! Two implementations:
//! - [`AdditiveForecaster`] (default): linear trend + Fourier seasonality,
//!   solved by least squares, 80% intervals from the residual scale.
//! - [`RemoteForecaster`]: POSTs the series to an HTTP endpoint.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use log::info;
use nalgebra::{DMatrix, DVector};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::analysis::dates::coerce_date;
use crate::chart::{Axis, LineChart, Series};
use crate::domain::{ServiceSettings, Table, Value};
use crate::error::{AppError, ServiceError};
use crate::math::{WEEKLY_PERIOD, YEARLY_PERIOD, fit_least_squares, fourier_terms, trend_terms};
use crate::services::http::{build_client, post_json, with_single_retry};

/// Days predicted past the last observed date.
pub const FORECAST_HORIZON_DAYS: usize = 365;

/// z-score of an 80% two-sided normal interval.
const Z_80: f64 = 1.281_551_565_544_600_4;

/// One observation handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub ds: NaiveDate,
    pub y: f64,
}

/// One output row of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub ds: NaiveDate,
    #[serde(default)]
    pub trend: Option<f64>,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    #[serde(default)]
    pub additive_terms: Option<f64>,
    pub yhat: f64,
    #[serde(default)]
    pub is_future: bool,
}

/// A forecast together with what it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub date_column: String,
    pub value_column: String,
    pub model: &'static str,
    /// Number of points the model was fitted on.
    pub history_len: usize,
    pub rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub fn future_rows(&self) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter().filter(|r| r.is_future)
    }

    /// The forecast as a generic table (for display and CSV export).
    pub fn to_table(&self) -> Table {
        let columns = ["ds", "trend", "yhat_lower", "yhat_upper", "additive_terms", "yhat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let opt = |v: Option<f64>| v.map(Value::Number).unwrap_or(Value::Empty);
        let rows = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    Value::Date(r.ds),
                    opt(r.trend),
                    Value::Number(r.yhat_lower),
                    Value::Number(r.yhat_upper),
                    opt(r.additive_terms),
                    Value::Number(r.yhat),
                ]
            })
            .collect();
        Table::from_rows(columns, rows)
    }

    /// `yhat` over `ds`.
    pub fn to_chart(&self) -> LineChart {
        LineChart {
            title: "Forecast".to_string(),
            x_title: "ds".to_string(),
            left_title: "yhat".to_string(),
            right_title: String::new(),
            categories: self.rows.iter().map(|r| r.ds.to_string()).collect(),
            series: vec![Series {
                name: "yhat".to_string(),
                axis: Axis::Left,
                values: self.rows.iter().map(|r| r.yhat).collect(),
            }],
        }
    }
}

/// Fit on a history and predict `horizon_days` past its last date.
pub trait Forecaster {
    fn name(&self) -> &'static str;

    fn forecast(&self, series: &[SeriesPoint], horizon_days: usize) -> Result<Vec<ForecastRow>, ServiceError>;
}

/// Pull a `(ds, y)` series out of the unaggregated table.
///
/// Rows whose value is empty or not a number are skipped. A date that cannot
/// be read fails with its row number. Points are returned in date order.
pub fn extract_series(table: &Table, date_column: &str, value_column: &str) -> Result<Vec<SeriesPoint>, AppError> {
    let date_idx = table
        .column_index(date_column)
        .ok_or_else(|| AppError::new(2, format!("Missing date column: `{date_column}`")))?;
    let value_idx = table
        .column_index(value_column)
        .ok_or_else(|| AppError::new(2, format!("Missing value column: `{value_column}`")))?;

    let mut points = Vec::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        let Some(y) = row[value_idx].as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        let ds = coerce_date(&row[date_idx]).ok_or_else(|| {
            AppError::new(
                3,
                format!(
                    "Row {}: cannot read '{}' in `{date_column}` as a date.",
                    row_idx + 1,
                    row[date_idx]
                ),
            )
        })?;
        points.push(SeriesPoint { ds, y });
    }

    if points.len() < 2 {
        return Err(AppError::new(
            3,
            format!(
                "Need at least 2 numeric values in `{value_column}` to forecast (found {}).",
                points.len()
            ),
        ));
    }

    points.sort_by_key(|p| p.ds);
    Ok(points)
}

/// Extract the series and run the model with the fixed horizon.
pub fn run_forecast(
    forecaster: &dyn Forecaster,
    table: &Table,
    date_column: &str,
    value_column: &str,
) -> Result<ForecastTable, AppError> {
    let series = extract_series(table, date_column, value_column)?;
    info!(
        "forecasting `{value_column}` over `{date_column}`: {} points, model={}",
        series.len(),
        forecaster.name()
    );
    let rows = forecaster.forecast(&series, FORECAST_HORIZON_DAYS)?;

    Ok(ForecastTable {
        date_column: date_column.to_string(),
        value_column: value_column.to_string(),
        model: forecaster.name(),
        history_len: series.len(),
        rows,
    })
}

/// The configured forecaster: remote when a URL is set, local otherwise.
pub fn forecaster_from_settings(settings: &ServiceSettings) -> Result<Box<dyn Forecaster>, ServiceError> {
    match &settings.forecast_url {
        Some(url) => Ok(Box::new(RemoteForecaster::new(url.clone(), settings.timeout)?)),
        None => Ok(Box::new(AdditiveForecaster::default())),
    }
}

/// Linear trend + Fourier seasonality.
#[derive(Debug, Clone)]
pub struct AdditiveForecaster {
    /// Used only when the history spans at least two years.
    pub yearly_order: usize,
    /// Used only when observations are closer than a week apart.
    pub weekly_order: usize,
}

impl Default for AdditiveForecaster {
    fn default() -> Self {
        Self {
            yearly_order: 10,
            weekly_order: 3,
        }
    }
}

impl AdditiveForecaster {
    fn design_row(&self, t_days: f64, scale: f64, yearly: usize, weekly: usize) -> Vec<f64> {
        let mut row = trend_terms(t_days / scale).to_vec();
        row.extend(fourier_terms(t_days, YEARLY_PERIOD, yearly));
        row.extend(fourier_terms(t_days, WEEKLY_PERIOD, weekly));
        row
    }
}

impl Forecaster for AdditiveForecaster {
    fn name(&self) -> &'static str {
        "additive"
    }

    fn forecast(&self, series: &[SeriesPoint], horizon_days: usize) -> Result<Vec<ForecastRow>, ServiceError> {
        let (first, last) = match (series.first(), series.last()) {
            (Some(f), Some(l)) if series.len() >= 2 => (f.ds, l.ds),
            _ => return Err(ServiceError::Model("need at least 2 observations".to_string())),
        };
        let span = (last - first).num_days() as f64;
        if span <= 0.0 {
            return Err(ServiceError::Model("history covers a single date".to_string()));
        }

        let history: BTreeSet<NaiveDate> = series.iter().map(|p| p.ds).collect();
        let min_gap = history
            .iter()
            .zip(history.iter().skip(1))
            .map(|(a, b)| (*b - *a).num_days())
            .min()
            .unwrap_or(i64::MAX);

        let mut yearly = if span >= 730.0 { self.yearly_order } else { 0 };
        let mut weekly = if min_gap < 7 { self.weekly_order } else { 0 };

        let n = series.len();
        // Keep the system overdetermined; drop the highest harmonics first.
        while 2 + 2 * (yearly + weekly) >= n && (yearly > 0 || weekly > 0) {
            if yearly > 0 {
                yearly -= 1;
            } else {
                weekly -= 1;
            }
        }
        let p = 2 + 2 * (yearly + weekly);

        let t_of = |d: NaiveDate| (d - first).num_days() as f64;

        let mut x = DMatrix::zeros(n, p);
        for (i, point) in series.iter().enumerate() {
            for (j, v) in self.design_row(t_of(point.ds), span, yearly, weekly).into_iter().enumerate() {
                x[(i, j)] = v;
            }
        }
        let y = DVector::from_iterator(n, series.iter().map(|p| p.y));

        let fit = fit_least_squares(&x, &y)
            .ok_or_else(|| ServiceError::Model("least squares solve failed".to_string()))?;
        let sigma = fit.sigma(n);
        let beta = &fit.coefficients;

        let future = (1..=horizon_days as u64).filter_map(|d| last.checked_add_days(Days::new(d)));

        let rows = history
            .iter()
            .copied()
            .chain(future)
            .map(|ds| {
                let t = t_of(ds);
                let basis = self.design_row(t, span, yearly, weekly);
                let trend = beta[0] * basis[0] + beta[1] * basis[1];
                let seasonal: f64 = basis.iter().zip(beta.iter()).skip(2).map(|(b, c)| b * c).sum();
                let yhat = trend + seasonal;

                let h = (ds - last).num_days().max(0) as f64;
                let half_width = Z_80 * sigma * (1.0 + h / n as f64).sqrt();

                ForecastRow {
                    ds,
                    trend: Some(trend),
                    yhat_lower: yhat - half_width,
                    yhat_upper: yhat + half_width,
                    additive_terms: Some(seasonal),
                    yhat,
                    is_future: ds > last,
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Forecast model served over HTTP.
pub struct RemoteForecaster {
    client: Client,
    url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ForecastRequest<'a> {
    periods: usize,
    freq: &'static str,
    series: &'a [SeriesPoint],
}

#[derive(Deserialize)]
struct ForecastResponse {
    rows: Vec<ForecastRow>,
}

impl RemoteForecaster {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            url,
            timeout,
        })
    }
}

impl Forecaster for RemoteForecaster {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn forecast(&self, series: &[SeriesPoint], horizon_days: usize) -> Result<Vec<ForecastRow>, ServiceError> {
        let request = ForecastRequest {
            periods: horizon_days,
            freq: "D",
            series,
        };

        let response: ForecastResponse = with_single_retry("forecast", || {
            post_json(&self.client, &self.url, None, &request, self.timeout)
        })?;

        if response.rows.is_empty() {
            return Err(ServiceError::Decode("forecast response has no rows".to_string()));
        }

        let last = series.iter().map(|p| p.ds).max();
        let mut rows = response.rows;
        for row in &mut rows {
            row.is_future = last.is_some_and(|l| row.ds > l);
        }
        rows.sort_by_key(|r| r.ds);
        Ok(rows)
    }
}
