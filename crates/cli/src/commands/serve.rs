use super::{build_engine, shutdown_signal};
use anyhow::Result;
use clap::Args;
use fight_exposure_core::AppConfig;
use fight_exposure_web_api::ApiServer;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address (defaults to `server.host:server.port`)
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Skip the periodic scan of LIVE participants. Queued watermark raises
    /// are still retried.
    #[arg(long)]
    pub no_live_sweep: bool,
}

pub async fn run(config: &AppConfig, args: ServeArgs) -> Result<()> {
    let addr = args
        .addr
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let engine = build_engine(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if args.no_live_sweep {
        tracing::warn!(
            "LIVE participant sweep disabled; only queued watermark raises will be retried"
        );
        Arc::new(engine.sweeper().queue_only()).spawn(shutdown_rx)
    } else {
        engine.sweeper().spawn(shutdown_rx)
    };

    let server = ApiServer::new(engine);
    let served = server.serve_with_shutdown(&addr, shutdown_signal()).await;

    // Stop the sweeper whether the server exited cleanly or not.
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "watermark sweeper task failed");
    }

    served
}
