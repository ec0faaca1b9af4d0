//! Expense and income rows.
//!
//! Both tables share a layout, so each operation matches on [`RecordKind`]
//! and runs the same query against the right entity. Mutations filter on
//! `id AND user_id`; zero affected rows means the row is absent or belongs
//! to someone else, and is reported as `NotFoundOrForbidden`.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument, warn};

use super::SeaOrmRecordStore;
use crate::entities::{Expense, Income, expense, income};
use crate::errors::{Error, Result};
use crate::models::{NewRecord, Record, RecordKind};

const fn not_found(kind: RecordKind, id: i64) -> Error {
    Error::NotFoundOrForbidden {
        resource: kind.resource(),
        id,
    }
}

/// Re-checks the owner on a row read back after a mutation.
fn verify_owner(kind: RecordKind, id: i64, record: Option<Record>, owner: &str) -> Result<Record> {
    match record {
        Some(record) if record.owner.as_deref() == Some(owner) => Ok(record),
        Some(_) => {
            warn!("{} {} changed owner during update", kind.resource(), id);
            Err(not_found(kind, id))
        }
        None => Err(not_found(kind, id)),
    }
}

impl SeaOrmRecordStore {
    /// Lists the caller's rows, newest first. Rows created in the same instant
    /// fall back to descending id.
    #[instrument(skip(self))]
    pub(crate) async fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        let owner = self.owner().await?;
        let db = self.connection();

        let records: Vec<Record> = match kind {
            RecordKind::Expense => Expense::find()
                .filter(expense::Column::UserId.eq(owner.as_str()))
                .order_by_desc(expense::Column::CreatedAt)
                .order_by_desc(expense::Column::Id)
                .all(db)
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
            RecordKind::Income => Income::find()
                .filter(income::Column::UserId.eq(owner.as_str()))
                .order_by_desc(income::Column::CreatedAt)
                .order_by_desc(income::Column::Id)
                .all(db)
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
        };

        debug!(
            "Fetched {} {} rows for {}",
            records.len(),
            kind.resource(),
            owner
        );
        Ok(records)
    }

    /// Inserts a draft owned by the caller and returns the stored row.
    #[instrument(skip(self, draft), fields(kind = %draft.kind))]
    pub(crate) async fn insert_record(&self, draft: NewRecord) -> Result<Record> {
        let owner = self.owner().await?;
        let db = self.connection();
        let now = Utc::now();

        let record: Record = match draft.kind {
            RecordKind::Expense => expense::ActiveModel {
                category: Set(draft.category),
                name: Set(draft.name),
                amount: Set(draft.amount),
                created_at: Set(now),
                user_id: Set(owner.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
            .into(),
            RecordKind::Income => income::ActiveModel {
                category: Set(draft.category),
                name: Set(draft.name),
                amount: Set(draft.amount),
                created_at: Set(now),
                user_id: Set(owner.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
            .into(),
        };

        info!(
            "Created {} id={:?} amount={} for {}",
            record.kind, record.id, record.amount, owner
        );
        Ok(record)
    }

    /// Overwrites category, name and amount of the caller's row `id`.
    #[instrument(skip(self, patch), fields(kind = %patch.kind))]
    pub(crate) async fn update_record(&self, id: i64, patch: NewRecord) -> Result<Record> {
        let owner = self.owner().await?;
        let db = self.connection();
        let kind = patch.kind;

        let affected = match kind {
            RecordKind::Expense => {
                Expense::update_many()
                    .col_expr(expense::Column::Category, Expr::value(patch.category))
                    .col_expr(expense::Column::Name, Expr::value(patch.name))
                    .col_expr(expense::Column::Amount, Expr::value(patch.amount))
                    .filter(expense::Column::Id.eq(id))
                    .filter(expense::Column::UserId.eq(owner.as_str()))
                    .exec(db)
                    .await?
                    .rows_affected
            }
            RecordKind::Income => {
                Income::update_many()
                    .col_expr(income::Column::Category, Expr::value(patch.category))
                    .col_expr(income::Column::Name, Expr::value(patch.name))
                    .col_expr(income::Column::Amount, Expr::value(patch.amount))
                    .filter(income::Column::Id.eq(id))
                    .filter(income::Column::UserId.eq(owner.as_str()))
                    .exec(db)
                    .await?
                    .rows_affected
            }
        };

        if affected == 0 {
            warn!("Update of {} {} matched no row for {}", kind.resource(), id, owner);
            return Err(not_found(kind, id));
        }

        let stored: Option<Record> = match kind {
            RecordKind::Expense => Expense::find_by_id(id).one(db).await?.map(Record::from),
            RecordKind::Income => Income::find_by_id(id).one(db).await?.map(Record::from),
        };

        let record = verify_owner(kind, id, stored, &owner)?;
        info!("Updated {} {} for {}", kind.resource(), id, owner);
        Ok(record)
    }

    /// Deletes the caller's row `id`.
    #[instrument(skip(self))]
    pub(crate) async fn delete_record(&self, kind: RecordKind, id: i64) -> Result<()> {
        let owner = self.owner().await?;
        let db = self.connection();

        let affected = match kind {
            RecordKind::Expense => {
                Expense::delete_many()
                    .filter(expense::Column::Id.eq(id))
                    .filter(expense::Column::UserId.eq(owner.as_str()))
                    .exec(db)
                    .await?
                    .rows_affected
            }
            RecordKind::Income => {
                Income::delete_many()
                    .filter(income::Column::Id.eq(id))
                    .filter(income::Column::UserId.eq(owner.as_str()))
                    .exec(db)
                    .await?
                    .rows_affected
            }
        };

        if affected == 0 {
            warn!("Delete of {} {} matched no row for {}", kind.resource(), id, owner);
            return Err(not_found(kind, id));
        }

        info!("Deleted {} {} for {}", kind.resource(), id, owner);
        Ok(())
    }
}
