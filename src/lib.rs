//! `excel-plotter` library crate.
//!
//! The binary (`xplot`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the CLI and the TUI share one analysis pipeline
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod chart;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod services;
pub mod tui;
