//! Data shaping: column roles, date labels, grouped sums and filters.

pub mod aggregate;
pub mod classify;
pub mod dates;
pub mod filter;

pub use aggregate::{Aggregation, group_sum};
pub use classify::{ColumnRoles, classify_columns};
pub use filter::{Criterion, apply_filters, filter_date_range, has_active_selection};
