//! Record store - authenticated, ownership-scoped persistence.
//!
//! [`RecordStore`] is the seam between the engine and the backend. Every
//! operation resolves the caller's identity through the [`AuthGate`] first
//! and fails fast with `Unauthenticated` when that is impossible; every
//! query and mutation is then scoped to that owner.

pub mod records;
pub mod settings;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::{AuthGate, resolve_identity};
use crate::errors::Result;
use crate::models::{Currency, NewRecord, Record, RecordKind, Settings};

/// Ownership-scoped CRUD for expenses, income and user settings.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of `kind` owned by the caller, newest first.
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>>;

    /// Persists a draft. The owner is taken from the session, never from the draft.
    async fn create(&self, draft: NewRecord) -> Result<Record>;

    /// Overwrites the caller's record `id` with `patch`.
    async fn update(&self, id: i64, patch: NewRecord) -> Result<Record>;

    /// Deletes the caller's record `id`.
    async fn delete(&self, kind: RecordKind, id: i64) -> Result<()>;

    /// The caller's settings row. `None` means no preference was ever saved.
    async fn get_settings(&self) -> Result<Option<Settings>>;

    /// Inserts or overwrites the caller's settings row.
    async fn upsert_settings(&self, currency: Currency) -> Result<Settings>;
}

/// [`RecordStore`] backed by a `SeaORM` connection.
///
/// The connection is shared, so several stores (one per signed-in user)
/// can sit on the same database.
pub struct SeaOrmRecordStore {
    db: Arc<DatabaseConnection>,
    auth: Arc<dyn AuthGate>,
}

impl SeaOrmRecordStore {
    /// Creates a store over `db` that resolves identities through `auth`.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<dyn AuthGate>) -> Self {
        Self { db, auth }
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Resolves the owner id every query is scoped to.
    async fn owner(&self) -> Result<String> {
        Ok(resolve_identity(self.auth.as_ref()).await?.user_id)
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>> {
        self.list_records(kind).await
    }

    async fn create(&self, draft: NewRecord) -> Result<Record> {
        self.insert_record(draft).await
    }

    async fn update(&self, id: i64, patch: NewRecord) -> Result<Record> {
        self.update_record(id, patch).await
    }

    async fn delete(&self, kind: RecordKind, id: i64) -> Result<()> {
        self.delete_record(kind, id).await
    }

    async fn get_settings(&self) -> Result<Option<Settings>> {
        self.fetch_settings().await
    }

    async fn upsert_settings(&self, currency: Currency) -> Result<Settings> {
        self.save_settings(currency).await
    }
}
