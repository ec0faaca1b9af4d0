use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use expensio::config::{self, database};
use expensio::core::summarize;
use expensio::engine::session;
use expensio::{Engine, EngineOptions, LocalAuthGate, Result, SeaOrmRecordStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok(); // env vars can also be set externally

    let app_config = config::load_app_configuration()?;
    info!("Loaded configuration for user {}", app_config.user_id);

    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    let gate = Arc::new(LocalAuthGate::new());
    let store = Arc::new(SeaOrmRecordStore::new(Arc::new(db), gate.clone()));
    let engine = Engine::new(store, EngineOptions::from(&app_config));

    gate.sign_in(&app_config.user_id).await;
    session::sync_with_session(&engine, gate.as_ref()).await?;

    let snapshot = engine.snapshot().await;
    if let Some(message) = &snapshot.error {
        warn!("Engine reported an error: {}", message);
    }

    let summary = summarize(&snapshot.expenses, &snapshot.income, snapshot.currency);
    info!(
        "{} expenses totalling {:.2} {}, {} income entries totalling {:.2} {}",
        snapshot.expenses.len(),
        summary.totals.expense_total,
        summary.currency,
        snapshot.income.len(),
        summary.totals.income_total,
        summary.currency
    );
    for line in &summary.expenses_by_category {
        info!(
            "  {}: {:.2} ({:.1}%)",
            line.category, line.total, line.share_percent
        );
    }
    if summary.totals.is_broke {
        warn!("Spending exceeds income by {:.2} {}", -summary.balance, summary.currency);
    } else {
        info!("Balance: {:.2} {}", summary.balance, summary.currency);
    }

    gate.sign_out().await;
    engine.clear().await;
    Ok(())
}
