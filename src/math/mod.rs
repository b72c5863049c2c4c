//! Mathematical utilities: forecast basis functions and least squares.

pub mod basis;
pub mod ols;

pub use basis::*;
pub use ols::*;
