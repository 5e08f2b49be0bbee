pub mod refresh;
pub mod serve;
pub mod stake_info;
pub mod sweep;

pub use refresh::RefreshArgs;
pub use serve::ServeArgs;
pub use stake_info::StakeInfoArgs;
pub use sweep::SweepArgs;

use anyhow::{Context, Result};
use fight_exposure_core::AppConfig;
use fight_exposure_data::{DatabaseClient, PgStore};
use fight_exposure_engine::ExposureEngine;
use fight_exposure_exchange::{ExchangeClient, ExchangeClientConfig};
use serde::Serialize;
use std::sync::Arc;

/// Connects storage and the exchange client and wires the engine.
pub async fn build_engine(config: &AppConfig) -> Result<Arc<ExposureEngine>> {
    let db = DatabaseClient::from_config(&config.database).await?;
    db.migrate().await?;
    let store = Arc::new(PgStore::new(db.pool().clone()));

    let exchange = ExchangeClient::new(ExchangeClientConfig::from_config(&config.exchange))
        .context("failed to build exchange client")?;

    tracing::info!(
        exchange = exchange.base_url(),
        netting_policy = ?config.exposure.netting_policy,
        "exposure engine ready"
    );

    Ok(Arc::new(ExposureEngine::new(
        store,
        Arc::new(exchange),
        &config.exposure,
    )))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                    }
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "failed to install signal handlers, falling back to Ctrl+C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
}
