use clap::{Parser, Subcommand};
use fight_exposure_core::{AppConfig, ConfigLoader};

mod commands;

use commands::{RefreshArgs, ServeArgs, StakeInfoArgs, SweepArgs};

#[derive(Parser)]
#[command(name = "fight-exposure")]
#[command(about = "Capital exposure accounting for trading fights", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: String,

    /// Config profile layered over the base file (reads `Config.{profile}.toml`)
    #[arg(short, long, global = true, env = "APP_PROFILE")]
    profile: Option<String>,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web API and the watermark sweeper
    Serve(ServeArgs),
    /// Refresh one participant's watermark against the ledger and the exchange
    Refresh(RefreshArgs),
    /// Print the exposure snapshot of an account
    StakeInfo(StakeInfoArgs),
    /// Re-run refresh for queued and LIVE participants
    Sweep(SweepArgs),
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        ConfigLoader::load_layered(&self.config, self.profile.as_deref())
    }
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = cli.load_config()?;

    match cli.command {
        Commands::Serve(args) => commands::serve::run(&config, args).await?,
        Commands::Refresh(args) => commands::refresh::run(&config, args).await?,
        Commands::StakeInfo(args) => commands::stake_info::run(&config, args).await?,
        Commands::Sweep(args) => commands::sweep::run(&config, args).await?,
    }

    Ok(())
}
