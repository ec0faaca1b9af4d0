//! Keeps an [`Engine`] in step with the authentication gate.
//!
//! Signing in loads the user's data, signing out clears it, and a token
//! refresh leaves data alone.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::Engine;
use crate::auth::{AuthEvent, AuthGate};
use crate::errors::Result;

/// Reacts to one auth transition.
pub async fn handle_event(engine: &Engine, event: &AuthEvent) {
    match event {
        AuthEvent::SignedIn(session) => {
            info!("Session established for {}, loading data", session.user_id);
            // Failures are recorded on the engine for the UI.
            if let Err(e) = engine.initialize().await {
                warn!("Initialization after sign-in failed: {}", e);
            }
        }
        AuthEvent::SignedOut => engine.clear().await,
        AuthEvent::TokenRefreshed(session) => {
            debug!("Token refreshed for {}", session.user_id);
        }
    }
}

/// Loads data when a session already exists, clears otherwise.
pub async fn sync_with_session(engine: &Engine, gate: &dyn AuthGate) -> Result<()> {
    if gate.current_session().await?.is_some() {
        if let Err(e) = engine.initialize().await {
            warn!("Initialization failed: {}", e);
        }
    } else {
        engine.clear().await;
    }
    Ok(())
}

/// Drives `engine` from `gate` until the gate's event channel closes.
pub async fn run_session_loop(engine: Arc<Engine>, gate: Arc<dyn AuthGate>) -> Result<()> {
    // Subscribe first so no transition slips between the check and the loop.
    let mut events = gate.subscribe();
    sync_with_session(&engine, gate.as_ref()).await?;

    loop {
        match events.recv().await {
            Ok(event) => handle_event(&engine, &event).await,
            Err(RecvError::Lagged(missed)) => {
                warn!("Missed {} auth events, resyncing", missed);
                sync_with_session(&engine, gate.as_ref()).await?;
            }
            Err(RecvError::Closed) => {
                info!("Auth event stream closed");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::auth::LocalAuthGate;
    use crate::db::RecordStore;
    use crate::models::{RecordDraft, RecordKind};
    use crate::test_utils::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sign_in_loads_and_sign_out_clears() -> Result<()> {
        init_test_tracing();
        let (_db, gate, store) = setup_store("alice").await?;
        store
            .create(RecordDraft::new("food", "lunch", "40").validate(RecordKind::Expense)?)
            .await?;
        let engine = test_engine(store);

        handle_event(&engine, &AuthEvent::SignedIn(gate.current_session().await?.unwrap())).await;
        assert_eq!(engine.totals().await.expense_total, 40.0);

        handle_event(&engine, &AuthEvent::SignedOut).await;
        assert!(engine.records(RecordKind::Expense).await.is_empty());
        assert_eq!(engine.totals().await.expense_total, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_data() -> Result<()> {
        let (_db, gate, store) = setup_store("alice").await?;
        let engine = test_engine(store);
        engine
            .add_income(&RecordDraft::new("salary", "job", "1000"))
            .await?;

        let refreshed = gate.refresh_token().await?;
        handle_event(&engine, &AuthEvent::TokenRefreshed(refreshed)).await;
        assert_eq!(engine.totals().await.income_total, 1000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_without_session_clears() -> Result<()> {
        let (_db, _gate, store) = setup_store("alice").await?;
        let engine = test_engine(store);
        engine.add_expense(&RecordDraft::new("bills", "power", "60")).await?;

        let empty_gate = LocalAuthGate::new();
        sync_with_session(&engine, &empty_gate).await?;
        assert!(engine.records(RecordKind::Expense).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_follows_gate_until_closed() -> Result<()> {
        let db = setup_test_db().await?;
        let gate = Arc::new(LocalAuthGate::new());
        let store = Arc::new(crate::db::SeaOrmRecordStore::new(db, gate.clone()));
        let engine = Arc::new(test_engine(store.clone()));
        let mut snapshots = engine.subscribe();

        let driver = tokio::spawn(run_session_loop(engine.clone(), gate.clone()));

        gate.sign_in("alice").await;
        store
            .create(RecordDraft::new("salary", "job", "500").validate(RecordKind::Income)?)
            .await?;
        gate.sign_out().await;
        gate.sign_in("alice").await;

        // Wait until the second sign-in has loaded the income entry.
        let loaded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                snapshots.changed().await.unwrap();
                let snapshot = snapshots.borrow_and_update().clone();
                if !snapshot.is_loading() && snapshot.totals.income_total == 500.0 {
                    return snapshot;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(loaded.income.len(), 1);

        driver.abort();
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_ends_when_events_close() -> Result<()> {
        let (_db, _gate, store) = setup_store("alice").await?;
        let engine = Arc::new(test_engine(store));
        let gate = Arc::new(ScriptedAuthGate::new(Some("alice"), Some("alice")));
        let driver = tokio::spawn(run_session_loop(engine.clone(), gate.clone()));

        tokio::task::yield_now().await;
        gate.close_events();
        let finished = tokio::time::timeout(Duration::from_secs(5), driver)
            .await
            .unwrap()
            .unwrap();
        assert!(finished.is_ok());
        Ok(())
    }
}
