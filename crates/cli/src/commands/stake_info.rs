use super::{build_engine, print_json};
use anyhow::Result;
use clap::Args;
use fight_exposure_core::AppConfig;

#[derive(Args, Debug)]
pub struct StakeInfoArgs {
    /// Exchange account
    #[arg(long)]
    pub account: String,

    /// Fight id (defaults to the account's LIVE fight)
    #[arg(long)]
    pub fight: Option<String>,
}

pub async fn run(config: &AppConfig, args: StakeInfoArgs) -> Result<()> {
    let engine = build_engine(config).await?;
    let info = engine
        .stake_info(&args.account, args.fight.as_deref())
        .await?;
    print_json(&info)
}
