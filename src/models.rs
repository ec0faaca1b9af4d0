//! Domain types shared by the record store and the engine.
//!
//! Expense and income entries have the same shape and differ only in their
//! category set and backing table, so both are a [`Record`] tagged with a
//! [`RecordKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::{Error, Result};

/// Spending categories offered by the expense form.
pub const EXPENSE_CATEGORIES: [&str; 4] = ["food", "transport", "bills", "entertainment"];

/// Income sources offered by the income form.
pub const INCOME_CATEGORIES: [&str; 5] = ["salary", "freelance", "investments", "gifts", "other"];

/// Longest accepted record name, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Money going out
    Expense,
    /// Money coming in
    Income,
}

impl RecordKind {
    /// Name of the backing table, also used in error messages.
    #[must_use]
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Expense => "expenses",
            Self::Income => "income",
        }
    }

    /// Categories a record of this kind may carry.
    #[must_use]
    pub const fn categories(self) -> &'static [&'static str] {
        match self {
            Self::Expense => &EXPENSE_CATEGORIES,
            Self::Income => &INCOME_CATEGORIES,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expense => f.write_str("expense"),
            Self::Income => f.write_str("income"),
        }
    }
}

/// An expense or income entry.
///
/// `id`, `created_at` and `owner` are `None` until the store has persisted
/// the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier
    pub id: Option<i64>,
    /// Collection this record lives in
    pub kind: RecordKind,
    /// One of `kind.categories()`
    pub category: String,
    /// Short label, 1 to 50 characters
    pub name: String,
    /// Non-negative amount in the display currency
    pub amount: f64,
    /// Server-side creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Owning user id, injected by the store
    pub owner: Option<String>,
}

/// Alias kept for readability at call sites that only deal with expenses.
pub type ExpenseRecord = Record;
/// Alias kept for readability at call sites that only deal with income.
pub type IncomeRecord = Record;

/// Display currencies. The label is applied to all totals; nothing is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    /// US dollar
    #[serde(rename = "USD")]
    Usd,
    /// Moroccan dirham
    #[default]
    #[serde(rename = "MAD")]
    Mad,
    /// Euro
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    /// Every selectable currency, in selector order.
    pub const ALL: [Self; 3] = [Self::Usd, Self::Mad, Self::Eur];

    /// ISO code as stored in the settings table.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Mad => "MAD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|currency| currency.code() == s)
            .ok_or_else(|| Error::validation("currency", format!("unsupported currency `{s}`")))
    }
}

/// Per-user preferences. At most one row exists per owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Owning user id
    pub owner: String,
    /// Selected display currency
    pub currency: Currency,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

/// Raw form submission for an expense or an income entry.
///
/// The amount stays text until [`RecordDraft::validate`] converts it, which
/// happens at the mutation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    /// Selected category
    pub category: String,
    /// Entry label
    pub name: String,
    /// Amount as typed, digits only
    pub amount: String,
}

/// Form submission for the expense form.
pub type ExpenseDraft = RecordDraft;
/// Form submission for the income form.
pub type IncomeDraft = RecordDraft;

impl RecordDraft {
    /// Builds a draft from borrowed form values.
    pub fn new(category: &str, name: &str, amount: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            amount: amount.to_string(),
        }
    }

    /// Checks the draft against the form contract for `kind` and converts the
    /// amount to a number.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn validate(&self, kind: RecordKind) -> Result<NewRecord> {
        if !kind.categories().contains(&self.category.as_str()) {
            return Err(Error::validation(
                "category",
                format!("`{}` is not a valid {kind} category", self.category),
            ));
        }

        let name_chars = self.name.chars().count();
        if name_chars == 0 {
            return Err(Error::validation("name", "name is required"));
        }
        if name_chars > MAX_NAME_CHARS {
            return Err(Error::validation(
                "name",
                format!("name must be at most {MAX_NAME_CHARS} characters"),
            ));
        }

        let amount = parse_amount(&self.amount)?;

        Ok(NewRecord {
            kind,
            category: self.category.clone(),
            name: self.name.clone(),
            amount,
        })
    }
}

/// A validated draft: what the store receives for `create` and `update`.
///
/// Carries no owner; the store injects the resolved identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Target collection
    pub kind: RecordKind,
    /// Validated category
    pub category: String,
    /// Validated name
    pub name: String,
    /// Converted amount
    pub amount: f64,
}

/// Converts a digits-only amount string into a number.
///
/// # Errors
/// Returns [`Error::Validation`] for empty input, any non-digit character,
/// or a number too large to represent.
pub fn parse_amount(raw: &str) -> Result<f64> {
    if raw.is_empty() {
        return Err(Error::validation("amount", "amount is required"));
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation("amount", "must be a valid number"));
    }
    let amount = raw
        .parse::<f64>()
        .map_err(|e| Error::validation("amount", e.to_string()))?;
    // Long digit strings parse to infinity rather than failing.
    if !amount.is_finite() {
        return Err(Error::validation("amount", "amount is too large"));
    }
    Ok(amount)
}
