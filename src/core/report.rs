//! Report generation for the summary charts.
//!
//! Groups a collection by category and computes each category's share of
//! the collection total. All functions are framework-agnostic and return
//! structured data for the presentation layer to draw.

use serde::Serialize;

use crate::core::totals::Totals;
use crate::models::{Currency, Record};

/// Total for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// Category name
    pub category: String,
    /// Sum of amounts in this category
    pub total: f64,
    /// Share of the collection total as a percentage (0-100)
    pub share_percent: f64,
}

/// Everything the dashboard shows at a glance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Label applied to every amount
    pub currency: Currency,
    /// Derived totals
    pub totals: Totals,
    /// Income minus expenses
    pub balance: f64,
    /// Expense totals by category
    pub expenses_by_category: Vec<CategoryTotal>,
    /// Income totals by category
    pub income_by_category: Vec<CategoryTotal>,
}

/// Groups `records` by category, in first-seen order.
#[must_use]
pub fn category_totals(records: &[Record]) -> Vec<CategoryTotal> {
    let mut groups: Vec<(String, f64)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(c, _)| *c == record.category) {
            Some((_, total)) => *total += record.amount,
            None => groups.push((record.category.clone(), record.amount)),
        }
    }

    let whole: f64 = groups.iter().map(|(_, total)| total).sum();
    groups
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            share_percent: calculate_share(total, whole),
            category,
            total,
        })
        .collect()
}

/// Percentage of `whole` that `part` represents; 0 when `whole` is 0.
#[must_use]
pub fn calculate_share(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }

    (part / whole) * 100.0
}

/// Builds a [`Summary`] from collections that are already loaded.
#[must_use]
pub fn summarize(expenses: &[Record], income: &[Record], currency: Currency) -> Summary {
    let totals = Totals::compute(expenses, income);
    Summary {
        currency,
        balance: totals.balance(),
        totals,
        expenses_by_category: category_totals(expenses),
        income_by_category: category_totals(income),
    }
}
