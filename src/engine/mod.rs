//! Aggregation engine - the in-memory model of a user's finances.
//!
//! The engine owns the expense and income collections, the display
//! currency and the derived [`Totals`]. Every mutation follows the same
//! shape: clear the previous error, mark busy, call the [`RecordStore`],
//! and only after the store confirms, write the result into local state
//! and recompute totals. A failed call leaves the collections exactly as
//! they were and records the error for the UI.
//!
//! Operations take `&self` and may overlap; they interleave only at await
//! points. Edits and removals of the same record are serialized by a
//! per-record lock.

pub mod loader;
mod locks;
pub mod session;
pub mod state;


use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::core::Totals;
use crate::db::RecordStore;
use crate::errors::{Error, Result};
use crate::models::{
    Currency, ExpenseDraft, ExpenseRecord, IncomeDraft, IncomeRecord, Record, RecordDraft,
    RecordKind, Settings,
};

pub use loader::{LoadReport, ResourceFailure};
pub use state::{EngineMode, Snapshot};

use locks::RecordLocks;
use state::EngineState;

/// Bounds `fut` by `limit`, mapping expiry to [`Error::Timeout`].
///
/// The underlying request is not cancelled server-side; its result is
/// simply discarded.
pub(crate) async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Tunables for an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Currency used before settings load and after `clear`
    pub default_currency: Currency,
    /// Per-resource deadline during `initialize`
    pub fetch_timeout: Duration,
    /// Deadline for the store call of each mutation
    pub mutation_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_currency: Currency::default(),
            fetch_timeout: Duration::from_millis(8_000),
            mutation_timeout: Duration::from_millis(10_000),
        }
    }
}

impl From<&AppConfig> for EngineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_currency: config.default_currency,
            fetch_timeout: config.fetch_timeout(),
            mutation_timeout: config.mutation_timeout(),
        }
    }
}

/// Marks the engine busy for as long as it lives, on every exit path.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Rejects loaded data that would make totals meaningless.
fn check_integrity(records: &[Record]) -> Result<()> {
    match records
        .iter()
        .find(|r| !r.amount.is_finite() || r.amount < 0.0)
    {
        Some(bad) => Err(Error::InvalidAmount { amount: bad.amount }),
        None => Ok(()),
    }
}

/// Client-side state container for one signed-in user.
pub struct Engine {
    store: Arc<dyn RecordStore>,
    options: EngineOptions,
    state: RwLock<EngineState>,
    in_flight: AtomicUsize,
    locks: RecordLocks,
    snapshots: watch::Sender<Snapshot>,
}

impl Engine {
    /// Creates an empty engine on top of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, options: EngineOptions) -> Self {
        let state = EngineState::new(options.default_currency);
        let (snapshots, _) = watch::channel(state.snapshot(EngineMode::Idle));
        Self {
            store,
            options,
            state: RwLock::new(state),
            in_flight: AtomicUsize::new(0),
            locks: RecordLocks::default(),
            snapshots,
        }
    }

    // --- Read side ---

    fn mode_for(&self, state: &EngineState) -> EngineMode {
        if self.is_loading() {
            EngineMode::Loading
        } else if let Some(failure) = &state.failure {
            EngineMode::Error(failure.clone())
        } else {
            EngineMode::Idle
        }
    }

    /// Owned copy of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        state.snapshot(self.mode_for(&state))
    }

    /// Receiver that observes a new [`Snapshot`] after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Current mode.
    pub async fn mode(&self) -> EngineMode {
        let state = self.state.read().await;
        self.mode_for(&state)
    }

    /// `true` while any operation is waiting on the store.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message of the last failed operation.
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Current totals.
    pub async fn totals(&self) -> Totals {
        self.state.read().await.totals
    }

    /// Current display currency.
    pub async fn currency(&self) -> Currency {
        self.state.read().await.currency
    }

    /// Copy of one collection, newest first.
    pub async fn records(&self, kind: RecordKind) -> Vec<Record> {
        self.state.read().await.collection(kind).to_vec()
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        self.snapshots.send_replace(snapshot);
    }

    // --- Write side ---

    /// Applies `change` and recomputes totals, unless a `clear` happened
    /// since the operation started.
    async fn apply<F>(&self, epoch: u64, change: F)
    where
        F: FnOnce(&mut EngineState),
    {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            warn!("Discarding result of an operation started before the last clear");
            return;
        }
        change(&mut state);
        state.recompute();
    }

    /// Store call bounded by the mutation timeout.
    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(operation, self.options.mutation_timeout, fut).await
    }

    /// Common wrapper around every mutation: reset error, mark busy, run `work`,
    /// record the error on failure, publish.
    async fn run_mutation<T, F, Fut>(&self, operation: &str, work: F) -> Result<T>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let epoch = {
            let mut state = self.state.write().await;
            state.error = None;
            state.epoch
        };

        let result = {
            let _busy = BusyGuard::enter(&self.in_flight);
            self.publish().await;
            work(epoch).await
        };

        if let Err(e) = &result {
            error!("Error in {}: {}", operation, e);
            let mut state = self.state.write().await;
            if state.epoch == epoch {
                state.error = Some(e.to_string());
            }
        }

        self.publish().await;
        result
    }

    /// Loads everything for the signed-in user.
    ///
    /// Per-resource failures fall back to empty data and are listed in the
    /// returned [`LoadReport`]; they do not make this call fail. An error is
    /// returned only when the merged data is unusable, in which case the
    /// engine enters [`EngineMode::Error`] and keeps its previous data.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<LoadReport> {
        info!("Starting data initialization");
        let epoch = {
            let mut state = self.state.write().await;
            state.error = None;
            state.epoch
        };

        let result = {
            let _busy = BusyGuard::enter(&self.in_flight);
            self.publish().await;
            let outcome = loader::load_all(self.store.as_ref(), self.options.fetch_timeout).await;
            self.absorb(epoch, outcome).await
        };

        match &result {
            Ok(report) => info!(
                "Data initialization completed ({} expenses, {} income, {} fallbacks)",
                report.expenses,
                report.income,
                report.failures.len()
            ),
            Err(e) => {
                error!("Critical error during data initialization: {}", e);
                let mut state = self.state.write().await;
                if state.epoch == epoch {
                    state.failure = Some(e.to_string());
                    state.error = Some(e.to_string());
                }
            }
        }

        self.publish().await;
        result
    }

    async fn absorb(&self, epoch: u64, outcome: loader::LoadOutcome) -> Result<LoadReport> {
        let loader::LoadOutcome {
            expenses,
            income,
            settings,
            failures,
        } = outcome;

        check_integrity(&expenses)?;
        check_integrity(&income)?;

        let currency = settings
            .as_ref()
            .map_or(self.options.default_currency, |s| s.currency);
        let report = LoadReport {
            expenses: expenses.len(),
            income: income.len(),
            currency,
            failures,
        };

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            warn!("Session was cleared while loading, discarding loaded data");
            return Ok(report);
        }
        state.expenses = expenses;
        state.income = income;
        state.currency = currency;
        state.failure = None;
        state.recompute();
        Ok(report)
    }

    /// Drops all user data. Called on sign-out. Idempotent.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        info!("Clearing all data");
        self.state
            .write()
            .await
            .reset(self.options.default_currency);
        self.publish().await;
    }

    /// Persists a new expense and puts it at the head of the list.
    pub async fn add_expense(&self, draft: &ExpenseDraft) -> Result<ExpenseRecord> {
        self.add(RecordKind::Expense, draft).await
    }

    /// Persists a new income entry and puts it at the head of the list.
    pub async fn add_income(&self, draft: &IncomeDraft) -> Result<IncomeRecord> {
        self.add(RecordKind::Income, draft).await
    }

    /// Deletes an expense in the store, then locally.
    pub async fn remove_expense(&self, id: i64) -> Result<()> {
        self.remove(RecordKind::Expense, id).await
    }

    /// Deletes an income entry in the store, then locally.
    pub async fn remove_income(&self, id: i64) -> Result<()> {
        self.remove(RecordKind::Income, id).await
    }

    /// Overwrites an expense in the store, then replaces it in place.
    pub async fn edit_expense(&self, id: i64, draft: &ExpenseDraft) -> Result<ExpenseRecord> {
        self.edit(RecordKind::Expense, id, draft).await
    }

    /// Overwrites an income entry in the store, then replaces it in place.
    pub async fn edit_income(&self, id: i64, draft: &IncomeDraft) -> Result<IncomeRecord> {
        self.edit(RecordKind::Income, id, draft).await
    }

    #[instrument(skip(self, draft))]
    async fn add(&self, kind: RecordKind, draft: &RecordDraft) -> Result<Record> {
        let operation = format!("add {kind}");
        let op = operation.as_str();
        self.run_mutation(op, move |epoch| async move {
            let new_record = draft.validate(kind)?;
            let created = self.call(op, self.store.create(new_record)).await?;
            // Head of the list, whatever its timestamp says.
            self.apply(epoch, |state| {
                state.collection_mut(kind).insert(0, created.clone());
            })
            .await;
            Ok(created)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, kind: RecordKind, id: i64) -> Result<()> {
        let operation = format!("remove {kind} {id}");
        let op = operation.as_str();
        self.run_mutation(op, move |epoch| async move {
            let _record_lock = self.locks.acquire(kind, id).await;
            // Always ask the store, even when the id is not held locally.
            self.call(op, self.store.delete(kind, id)).await?;
            self.apply(epoch, |state| {
                state.collection_mut(kind).retain(|r| r.id != Some(id));
            })
            .await;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, draft))]
    async fn edit(&self, kind: RecordKind, id: i64, draft: &RecordDraft) -> Result<Record> {
        let operation = format!("edit {kind} {id}");
        let op = operation.as_str();
        self.run_mutation(op, move |epoch| async move {
            let patch = draft.validate(kind)?;
            let _record_lock = self.locks.acquire(kind, id).await;
            let updated = self.call(op, self.store.update(id, patch)).await?;
            self.apply(epoch, |state| {
                match state
                    .collection_mut(kind)
                    .iter_mut()
                    .find(|r| r.id == Some(id))
                {
                    Some(slot) => *slot = updated.clone(),
                    None => debug!("{} {} updated remotely but not held locally", kind, id),
                }
            })
            .await;
            Ok(updated)
        })
        .await
    }

    /// Persists `code` as the display currency. The local currency changes
    /// only after the store confirms.
    #[instrument(skip(self))]
    pub async fn set_currency(&self, code: &str) -> Result<Settings> {
        let operation = format!("set currency {code}");
        let op = operation.as_str();
        self.run_mutation(op, move |epoch| async move {
            let currency: Currency = code.parse()?;
            let saved = self.call(op, self.store.upsert_settings(currency)).await?;
            self.apply(epoch, |state| state.currency = saved.currency)
                .await;
            Ok(saved)
        })
        .await
    }
}
