use super::{build_engine, print_json, shutdown_signal};
use anyhow::Result;
use clap::Args;
use fight_exposure_core::AppConfig;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Run a single sweep and exit
    #[arg(long)]
    pub once: bool,
}

pub async fn run(config: &AppConfig, args: SweepArgs) -> Result<()> {
    let engine = build_engine(config).await?;
    let sweeper = engine.sweeper();

    if args.once {
        let report = sweeper.sweep_once().await?;
        if report.failed > 0 {
            tracing::warn!(failed = report.failed, "some participants could not be refreshed");
        }
        return print_json(&report);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = sweeper.spawn(shutdown_rx);
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}
