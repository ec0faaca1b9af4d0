//! User settings rows.
//!
//! One row per owner, enforced by the unique constraint on `user_id`; saves
//! are `INSERT ... ON CONFLICT (user_id) DO UPDATE`.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{Set, prelude::*};
use tracing::{debug, info, instrument, warn};

use super::SeaOrmRecordStore;
use crate::entities::{UserSettings, user_settings};
use crate::errors::{Error, Result};
use crate::models::{Currency, Settings};

/// Maps a stored row to [`Settings`]. A row with an unrecognised currency
/// code is reported as no saved preference, so callers apply their own
/// default.
fn settings_from_row(row: user_settings::Model) -> Option<Settings> {
    match row.currency.parse::<Currency>() {
        Ok(currency) => Some(Settings {
            owner: row.user_id,
            currency,
            updated_at: row.updated_at,
        }),
        Err(e) => {
            warn!("Stored currency for {} is unusable ({}), ignoring it", row.user_id, e);
            None
        }
    }
}

impl SeaOrmRecordStore {
    /// Reads the caller's settings row, if one was ever saved.
    #[instrument(skip(self))]
    pub(crate) async fn fetch_settings(&self) -> Result<Option<Settings>> {
        let owner = self.owner().await?;
        let row = UserSettings::find()
            .filter(user_settings::Column::UserId.eq(owner.as_str()))
            .one(self.connection())
            .await?;
        debug!("Settings for {}: {:?}", owner, row.as_ref().map(|r| &r.currency));
        Ok(row.and_then(settings_from_row))
    }

    /// Upserts the caller's currency and returns the stored row.
    #[instrument(skip(self))]
    pub(crate) async fn save_settings(&self, currency: Currency) -> Result<Settings> {
        let owner = self.owner().await?;
        let db = self.connection();
        let now = Utc::now();

        let row = user_settings::ActiveModel {
            user_id: Set(owner.clone()),
            currency: Set(currency.code().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        UserSettings::insert(row)
            .on_conflict(
                OnConflict::column(user_settings::Column::UserId)
                    .update_columns([
                        user_settings::Column::Currency,
                        user_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;

        let stored = UserSettings::find()
            .filter(user_settings::Column::UserId.eq(owner.as_str()))
            .one(db)
            .await?
            .and_then(settings_from_row)
            .ok_or_else(|| Error::Remote {
                detail: format!("settings for {owner} missing after save"),
            })?;

        info!("Saved currency {} for {}", currency, owner);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::db::RecordStore;
    use crate::test_utils::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn test_get_settings_absent_is_none() -> Result<()> {
        let (_db, _gate, store) = setup_store("alice").await?;
        assert!(store.get_settings().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_overwrites_single_row() -> Result<()> {
        init_test_tracing();
        let (db, _gate, store) = setup_store("alice").await?;

        let first = store.upsert_settings(Currency::Usd).await?;
        assert_eq!(first.currency, Currency::Usd);
        assert_eq!(first.owner, "alice");

        let second = store.upsert_settings(Currency::Eur).await?;
        assert_eq!(second.currency, Currency::Eur);
        assert!(second.updated_at >= first.updated_at);

        assert_eq!(UserSettings::find().count(&*db).await?, 1);
        assert_eq!(store.get_settings().await?.unwrap().currency, Currency::Eur);
        Ok(())
    }

    #[tokio::test]
    async fn test_settings_are_per_owner() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = SeaOrmRecordStore::new(db.clone(), signed_in_gate("alice").await);
        let bob = SeaOrmRecordStore::new(db.clone(), signed_in_gate("bob").await);

        alice.upsert_settings(Currency::Eur).await?;
        assert!(bob.get_settings().await?.is_none());

        bob.upsert_settings(Currency::Usd).await?;
        assert_eq!(alice.get_settings().await?.unwrap().currency, Currency::Eur);
        assert_eq!(UserSettings::find().count(&*db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_stored_currency_reads_as_unset() -> Result<()> {
        let (db, _gate, store) = setup_store("alice").await?;
        let now = Utc::now();
        user_settings::ActiveModel {
            user_id: Set("alice".to_string()),
            currency: Set("XYZ".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*db)
        .await?;

        assert!(store.get_settings().await?.is_none());

        // Saving again repairs the row.
        store.upsert_settings(Currency::Usd).await?;
        assert_eq!(store.get_settings().await?.unwrap().currency, Currency::Usd);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_requires_session() -> Result<()> {
        let (_db, gate, store) = setup_store("alice").await?;
        gate.sign_out().await;
        assert!(store.upsert_settings(Currency::Eur).await.unwrap_err().is_auth());
        Ok(())
    }
}
