//! Terminal chart rendering for CLI output.

pub mod ascii;

pub use ascii::{render_bar_chart, render_line_chart};
