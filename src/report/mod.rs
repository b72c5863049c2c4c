//! Reporting utilities: text renderings of tables, datasets, analyses and
//! forecasts for the CLI and the question-answering context.

pub mod format;

pub use format::*;
