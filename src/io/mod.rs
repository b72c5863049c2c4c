//! Input/output helpers.
//!
//! - workbook/CSV ingest + date validation (`ingest`)
//! - table exports (CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
