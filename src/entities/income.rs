//! Income entity - One row per income entry.
//!
//! Same layout as the expense table; kept separate so the two collections
//! never mix in a query.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{Record, RecordKind};

/// Income database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "income")]
pub struct Model {
    /// Unique identifier, assigned on insert
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Income source (`salary`, `freelance`, ...)
    pub category: String,
    /// Short label entered by the user
    pub name: String,
    /// Amount in the user's display currency
    pub amount: f64,
    /// When the row was inserted
    pub created_at: DateTimeUtc,
    /// Owning user id
    pub user_id: String,
}

/// Income has no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Record {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            kind: RecordKind::Income,
            category: model.category,
            name: model.name,
            amount: model.amount,
            created_at: Some(model.created_at),
            owner: Some(model.user_id),
        }
    }
}
