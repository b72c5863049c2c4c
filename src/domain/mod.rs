//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the in-memory table and its cell values (`Table`, `Value`)
//! - conversion between `Table` and a Polars `DataFrame` (`frame`)
//! - report configuration enums (`ReportType`, `Granularity`)
//! - user selections and service settings (`Selections`, `ServiceSettings`)

pub mod frame;
pub mod table;
pub mod types;

pub use table::*;
pub use types::*;
