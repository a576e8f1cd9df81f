use anyhow::Result;
use building_services::{
    config::Config,
    pipeline::{self, UploadFlags},
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Merge building service-line layers and load them into a hosted feature service.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, global = true, default_value = "building_services.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge the source layers and write GeoJSON chunks
    Build,
    /// Upload previously written chunks
    Upload(UploadArgs),
    /// Build, then upload
    Run(UploadArgs),
}

#[derive(Args, Debug, Clone, Copy)]
struct UploadArgs {
    /// Convert and log the payloads without sending them
    #[arg(long)]
    dry_run: bool,

    /// Re-send whole chunks regardless of the upload history
    #[arg(long)]
    force: bool,
}

impl From<UploadArgs> for UploadFlags {
    fn from(a: UploadArgs) -> Self {
        UploadFlags {
            dry_run: a.dry_run,
            force: a.force,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    // ─── 2) load config ──────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!(config = %cli.config.display(), "startup");

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match cli.command {
        Command::Build => {
            pipeline::build(&cfg)?;
        }
        Command::Upload(args) => {
            pipeline::upload(&cfg, args.into()).await?;
        }
        Command::Run(args) => {
            pipeline::build(&cfg)?;
            pipeline::upload(&cfg, args.into()).await?;
        }
    }

    info!("all done");
    Ok(())
}
