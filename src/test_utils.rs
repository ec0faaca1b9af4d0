//! Shared test utilities for Expensio.
//!
//! Helpers for in-memory databases, signed-in stores, and store/gate
//! doubles that inject failures and delays.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthEvent, AuthGate, LocalAuthGate, Session, UserIdentity};
use crate::db::{RecordStore, SeaOrmRecordStore};
use crate::engine::{Engine, EngineOptions};
use crate::errors::{Error, Result};
use crate::models::{Currency, NewRecord, Record, RecordKind, Settings};

pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(Arc::new(db))
}

/// A local gate already signed in as `user_id`.
pub async fn signed_in_gate(user_id: &str) -> Arc<LocalAuthGate> {
    let gate = Arc::new(LocalAuthGate::new());
    gate.sign_in(user_id).await;
    gate
}

/// Fresh database plus a store signed in as `user_id`.
/// Returns (db, gate, store); keep the gate to sign out mid-test.
pub async fn setup_store(
    user_id: &str,
) -> Result<(Arc<DatabaseConnection>, Arc<LocalAuthGate>, Arc<SeaOrmRecordStore>)> {
    let db = setup_test_db().await?;
    let gate = signed_in_gate(user_id).await;
    let store = Arc::new(SeaOrmRecordStore::new(db.clone(), gate.clone()));
    Ok((db, gate, store))
}

/// Deadlines short enough to keep timeout tests fast.
pub fn test_options() -> EngineOptions {
    EngineOptions {
        default_currency: Currency::Mad,
        fetch_timeout: Duration::from_millis(200),
        mutation_timeout: Duration::from_millis(200),
    }
}

/// Engine over `store` with [`test_options`].
pub fn test_engine(store: Arc<dyn RecordStore>) -> Engine {
    Engine::new(store, test_options())
}

/// Gate whose two identity checks return whatever the test scripts.
pub struct ScriptedAuthGate {
    session_user: Option<String>,
    verified_user: Option<String>,
    events: Mutex<Option<broadcast::Sender<AuthEvent>>>,
}

impl ScriptedAuthGate {
    pub fn new(session_user: Option<&str>, verified_user: Option<&str>) -> Self {
        let (events, _) = broadcast::channel(4);
        Self {
            session_user: session_user.map(str::to_string),
            verified_user: verified_user.map(str::to_string),
            events: Mutex::new(Some(events)),
        }
    }

    /// Drops the event sender so every subscriber sees `Closed`.
    pub fn close_events(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl AuthGate for ScriptedAuthGate {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session_user.as_ref().map(|user_id| Session {
            user_id: user_id.clone(),
            access_token: "scripted".to_string(),
            issued_at: chrono::Utc::now(),
        }))
    }

    async fn verify_user(&self) -> Result<Option<UserIdentity>> {
        Ok(self.verified_user.as_ref().map(|user_id| UserIdentity {
            user_id: user_id.clone(),
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        let guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            // Already closed: hand out a receiver whose sender is gone.
            None => broadcast::channel(1).1,
        }
    }
}

/// Store operations [`FaultyStore`] can sabotage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListExpenses,
    ListIncome,
    GetSettings,
    Create,
    Update,
    Delete,
    UpsertSettings,
}

impl StoreOp {
    fn list(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Expense => Self::ListExpenses,
            RecordKind::Income => Self::ListIncome,
        }
    }
}

/// Wraps a real store and makes chosen operations fail or hang.
pub struct FaultyStore {
    inner: Arc<dyn RecordStore>,
    failing: Mutex<HashSet<StoreOp>>,
    stalled: Mutex<HashSet<StoreOp>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    stall_for: Duration,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            stall_for: Duration::from_secs(30),
        }
    }

    /// Wraps `inner`, delaying stalled operations by `delay` instead of
    /// hanging until the test deadline.
    pub fn with_delay(inner: Arc<dyn RecordStore>, delay: Duration) -> Self {
        Self {
            stall_for: delay,
            ..Self::new(inner)
        }
    }

    /// Makes `op` return a remote error.
    pub fn fail(&self, op: StoreOp) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op);
    }

    /// Undoes [`FaultyStore::fail`] and [`FaultyStore::stall`] for `op`.
    pub fn heal(&self, op: StoreOp) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op);
        self.stalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op);
    }

    /// Makes `op` sleep before reaching the inner store.
    pub fn stall(&self, op: StoreOp) {
        self.stalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op);
    }

    /// How many times `op` was called, including failed calls.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, op: StoreOp) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_insert(0) += 1;

        let stalled = self
            .stalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&op);
        if stalled {
            tokio::time::sleep(self.stall_for).await;
        }

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&op);
        if failing {
            return Err(Error::Remote {
                detail: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>> {
        self.enter(StoreOp::list(kind)).await?;
        self.inner.list(kind).await
    }

    async fn create(&self, record: NewRecord) -> Result<Record> {
        self.enter(StoreOp::Create).await?;
        self.inner.create(record).await
    }

    async fn update(&self, id: i64, record: NewRecord) -> Result<Record> {
        self.enter(StoreOp::Update).await?;
        self.inner.update(id, record).await
    }

    async fn delete(&self, kind: RecordKind, id: i64) -> Result<()> {
        self.enter(StoreOp::Delete).await?;
        self.inner.delete(kind, id).await
    }

    async fn get_settings(&self) -> Result<Option<Settings>> {
        self.enter(StoreOp::GetSettings).await?;
        self.inner.get_settings().await
    }

    async fn upsert_settings(&self, currency: Currency) -> Result<Settings> {
        self.enter(StoreOp::UpsertSettings).await?;
        self.inner.upsert_settings(currency).await
    }
}
