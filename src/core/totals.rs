//! Derived totals.
//!
//! Totals are always rebuilt from the full collections. Nothing patches
//! them incrementally, so they cannot drift from the records they describe.

use serde::Serialize;

use crate::models::Record;

/// Sums and solvency flag derived from the current collections.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    /// Sum of all expense amounts
    pub expense_total: f64,
    /// Sum of all income amounts
    pub income_total: f64,
    /// `income_total < expense_total`
    pub is_broke: bool,
}

impl Totals {
    /// Computes totals for the given collections.
    #[must_use]
    pub fn compute(expenses: &[Record], income: &[Record]) -> Self {
        let expense_total = sum_amounts(expenses);
        let income_total = sum_amounts(income);
        Self {
            expense_total,
            income_total,
            is_broke: income_total < expense_total,
        }
    }

    /// Income left after expenses; negative when broke.
    #[must_use]
    pub fn balance(&self) -> f64 {
        self.income_total - self.expense_total
    }
}

/// Plain sum of `amount` over `records`. Empty input gives `+0.0`.
#[must_use]
pub fn sum_amounts(records: &[Record]) -> f64 {
    // `Sum` for f64 starts from -0.0, which prints as "-0.00".
    records.iter().fold(0.0, |acc, r| acc + r.amount)
}
