use super::{build_engine, print_json};
use anyhow::Result;
use clap::Args;
use fight_exposure_core::{AppConfig, ParticipantKey};

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Fight id
    #[arg(long)]
    pub fight: String,

    /// User id
    #[arg(long)]
    pub user: String,
}

pub async fn run(config: &AppConfig, args: RefreshArgs) -> Result<()> {
    let engine = build_engine(config).await?;
    let key = ParticipantKey::new(args.fight, args.user);

    let refresh = engine.refresh(&key).await?;
    if refresh.pending {
        tracing::warn!(
            fight_id = %key.fight_id,
            user_id = %key.user_id,
            "watermark raise could not be persisted; run `sweep --once` to retry"
        );
    }
    print_json(&refresh)
}
