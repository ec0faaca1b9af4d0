//! Engine state and the snapshots handed to presentation code.

use serde::Serialize;

use crate::core::Totals;
use crate::models::{Currency, Record, RecordKind};

/// What the engine is doing, as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EngineMode {
    /// Nothing in flight
    Idle,
    /// At least one operation is waiting on the store
    Loading,
    /// The last `initialize` failed outside the per-resource fallbacks.
    /// Previously loaded data is still present.
    Error(String),
}

/// Owned copy of everything a view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Expenses, newest first
    pub expenses: Vec<Record>,
    /// Income entries, newest first
    pub income: Vec<Record>,
    /// Display currency
    pub currency: Currency,
    /// Derived totals
    pub totals: Totals,
    /// Current mode
    pub mode: EngineMode,
    /// Message of the last failed operation, cleared when the next one starts
    pub error: Option<String>,
}

impl Snapshot {
    /// `true` while an operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.mode == EngineMode::Loading
    }
}

/// Mutable state behind the engine's lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) expenses: Vec<Record>,
    pub(crate) income: Vec<Record>,
    pub(crate) currency: Currency,
    pub(crate) totals: Totals,
    /// Last operation error, shown as a banner
    pub(crate) error: Option<String>,
    /// Set when `initialize` fails; drives `EngineMode::Error`
    pub(crate) failure: Option<String>,
    /// Bumped by `clear`. Operations started under an older epoch do not
    /// write their results back.
    pub(crate) epoch: u64,
}

impl EngineState {
    pub(crate) fn new(currency: Currency) -> Self {
        Self {
            expenses: Vec::new(),
            income: Vec::new(),
            currency,
            totals: Totals::default(),
            error: None,
            failure: None,
            epoch: 0,
        }
    }

    pub(crate) fn collection(&self, kind: RecordKind) -> &[Record] {
        match kind {
            RecordKind::Expense => &self.expenses,
            RecordKind::Income => &self.income,
        }
    }

    pub(crate) fn collection_mut(&mut self, kind: RecordKind) -> &mut Vec<Record> {
        match kind {
            RecordKind::Expense => &mut self.expenses,
            RecordKind::Income => &mut self.income,
        }
    }

    pub(crate) fn recompute(&mut self) {
        self.totals = Totals::compute(&self.expenses, &self.income);
    }

    /// Empties everything and starts a new epoch.
    pub(crate) fn reset(&mut self, currency: Currency) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self::new(currency);
        self.epoch = epoch;
    }

    pub(crate) fn snapshot(&self, mode: EngineMode) -> Snapshot {
        Snapshot {
            expenses: self.expenses.clone(),
            income: self.income.clone(),
            currency: self.currency,
            totals: self.totals,
            mode,
            error: self.error.clone(),
        }
    }
}
