use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use drive_sync::auth;
use drive_sync::config::{self, AuthMode};
use drive_sync::drive::DriveClient;
use drive_sync::logging;
use drive_sync::sync::{Dataset, Syncer};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sync website data files from Google Drive folders"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Sync a single dataset: carousel, upcoming, testimonials or events
    #[arg(long)]
    only: Option<String>,

    /// Credential strategy; overrides `auth.mode` from the config
    #[arg(long, value_enum)]
    auth: Option<AuthMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let only = args.only.as_deref().map(str::parse::<Dataset>).transpose()?;
    let mode = args.auth.unwrap_or(cfg.auth.mode);

    let access_token = auth::resolve_access_token(&cfg, mode).await?;
    let drive = DriveClient::new(access_token)?;

    info!("syncing data from Google Drive");
    let reports = Syncer::new(&drive, &cfg).run(only).await?;
    for report in &reports {
        info!(
            dataset = %report.dataset,
            items = report.items,
            output = %report.output.display(),
            "dataset synced"
        );
    }
    info!(datasets = reports.len(), "sync complete");
    Ok(())
}
