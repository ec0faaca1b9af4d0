//! User settings entity - Per-user preferences.
//!
//! `user_id` is unique so that writes can be upserts keyed by owner.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User settings database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user id, at most one row per user
    #[sea_orm(unique)]
    pub user_id: String,
    /// Display currency code (`USD`, `MAD`, `EUR`)
    pub currency: String,
    /// When the row was first written
    pub created_at: DateTimeUtc,
    /// When the row was last written
    pub updated_at: DateTimeUtc,
}

/// `UserSettings` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
