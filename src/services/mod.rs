//! External collaborators: the forecast model and the text-completion API.
//!
//! Both are blocking calls with an explicit timeout and a single retry
//! (see `http`).

pub mod forecast;
pub mod http;
pub mod qa;

pub use forecast::{
    AdditiveForecaster, FORECAST_HORIZON_DAYS, ForecastRow, ForecastTable, Forecaster, RemoteForecaster,
    SeriesPoint, extract_series, forecaster_from_settings, run_forecast,
};
pub use qa::{CompletionClient, Conversation, Exchange, TextCompletion, ask, build_context, compose_prompt};
