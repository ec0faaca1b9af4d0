//! Database configuration module.
//!
//! Opens the `SeaORM` connection backing the record store and creates the
//! `expenses`, `income` and `user_settings` tables from the entity
//! definitions, so the schema always matches the Rust structs.

use crate::entities::{Expense, Income, UserSettings};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Fallback connection string when neither `config.toml` nor `DATABASE_URL` set one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://expensio.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Opening database connection");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the store tables if they do not exist yet.
///
/// Uses `Schema::create_table_from_entity`, which also emits the unique
/// constraint on `user_settings.user_id` that settings upserts rely on.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut expense_table = schema.create_table_from_entity(Expense);
    let mut income_table = schema.create_table_from_entity(Income);
    let mut settings_table = schema.create_table_from_entity(UserSettings);

    expense_table.if_not_exists();
    income_table.if_not_exists();
    settings_table.if_not_exists();

    db.execute(builder.build(&expense_table)).await?;
    db.execute(builder.build(&income_table)).await?;
    db.execute(builder.build(&settings_table)).await?;

    info!("Store tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ExpenseModel, IncomeModel, UserSettingsModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<ExpenseModel> = Expense::find().limit(1).all(&db).await?;
        let _: Vec<IncomeModel> = Income::find().limit(1).all(&db).await?;
        let _: Vec<UserSettingsModel> = UserSettings::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
