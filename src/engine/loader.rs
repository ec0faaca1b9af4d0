//! Bulk loader - fetches expenses, income and settings on session start.
//!
//! The three fetches run concurrently and are joined only when all of them
//! have settled. Each is wrapped so that a failure or a timeout yields its
//! fallback (empty list, no settings) and is logged, without affecting the
//! other two.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::with_timeout;
use crate::db::RecordStore;
use crate::errors::Result;
use crate::models::{Currency, Record, RecordKind, Settings};

/// A resource whose fetch fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    /// `expenses`, `income` or `settings`
    pub resource: &'static str,
    /// Error message of the failed fetch
    pub detail: String,
}

/// Raw result of [`load_all`].
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Loaded expenses, or empty on failure
    pub expenses: Vec<Record>,
    /// Loaded income, or empty on failure
    pub income: Vec<Record>,
    /// Loaded settings, or `None` on failure or when never saved
    pub settings: Option<Settings>,
    /// Fetches that fell back
    pub failures: Vec<ResourceFailure>,
}

/// What `initialize` merged into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Number of expenses loaded
    pub expenses: usize,
    /// Number of income entries loaded
    pub income: usize,
    /// Currency now in effect
    pub currency: Currency,
    /// Fetches that fell back
    pub failures: Vec<ResourceFailure>,
}

impl LoadReport {
    /// `true` when no fetch fell back.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches all three resources concurrently, each bounded by `timeout`.
#[instrument(skip(store))]
pub async fn load_all(store: &dyn RecordStore, timeout: Duration) -> LoadOutcome {
    let (expenses, income, settings) = tokio::join!(
        fetch_or_fallback("expenses", timeout, store.list(RecordKind::Expense)),
        fetch_or_fallback("income", timeout, store.list(RecordKind::Income)),
        fetch_or_fallback("settings", timeout, store.get_settings()),
    );

    let (expenses, expenses_failure) = expenses;
    let (income, income_failure) = income;
    let (settings, settings_failure) = settings;
    let failures: Vec<ResourceFailure> = [expenses_failure, income_failure, settings_failure]
        .into_iter()
        .flatten()
        .collect();

    info!(
        "Data loaded: {} expenses, {} income, currency {:?}, {} failed",
        expenses.len(),
        income.len(),
        settings.as_ref().map(|s| s.currency),
        failures.len()
    );

    LoadOutcome {
        expenses,
        income,
        settings,
        failures,
    }
}

/// Runs one fetch; on error or timeout returns `T::default()` and the failure.
async fn fetch_or_fallback<T, F>(
    resource: &'static str,
    timeout: Duration,
    fetch: F,
) -> (T, Option<ResourceFailure>)
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    debug!("Loading {}...", resource);
    match with_timeout(&format!("Loading {resource}"), timeout, fetch).await {
        Ok(value) => {
            debug!("Loading {} completed", resource);
            (value, None)
        }
        Err(e) => {
            error!("Loading {} failed: {}", resource, e);
            (
                T::default(),
                Some(ResourceFailure {
                    resource,
                    detail: e.to_string(),
                }),
            )
        }
    }
}
