//! Basis functions for the additive forecast model.
//!
//! The model is linear in its coefficients:
//!
//! - trend: `1`, `t`
//! - seasonality of period `P` and order `K`:
//!   `sin(2πkt/P)`, `cos(2πkt/P)` for `k = 1..=K`
//!
//! Numerical notes:
//! - `t` is measured in days from the first observation and rescaled to
//!   `[0, 1]` for the trend column so the design matrix stays well-conditioned.
//! - Seasonal terms use the raw day offset so that the phase is anchored to the
//!   calendar, not to the history length.

use std::f64::consts::PI;

/// Period of the yearly seasonality, in days.
pub const YEARLY_PERIOD: f64 = 365.25;

/// Period of the weekly seasonality, in days.
pub const WEEKLY_PERIOD: f64 = 7.0;

/// Fourier terms `[sin(2π·1·t/P), cos(2π·1·t/P), ..., sin(2π·K·t/P), cos(2π·K·t/P)]`.
pub fn fourier_terms(t_days: f64, period: f64, order: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(order * 2);
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * t_days / period;
        out.push(x.sin());
        out.push(x.cos());
    }
    out
}

/// Trend columns `[1, t_scaled]`.
pub fn trend_terms(t_scaled: f64) -> [f64; 2] {
    [1.0, t_scaled]
}
