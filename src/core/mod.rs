//! Core aggregation logic - pure functions over record collections.

/// Per-category breakdowns and summary figures for charts
pub mod report;
/// Expense/income totals and the solvency flag
pub mod totals;

pub use report::{CategoryTotal, Summary, category_totals, summarize};
pub use totals::Totals;
