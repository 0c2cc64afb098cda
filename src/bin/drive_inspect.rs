use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use drive_sync::auth;
use drive_sync::config::{self, AuthMode};
use drive_sync::drive::DriveClient;
use drive_sync::inspect;
use drive_sync::logging;

/// Check that every configured Drive folder is reachable and summarize its contents
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Credential strategy; overrides `auth.mode` from the config
    #[arg(long, value_enum)]
    auth: Option<AuthMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let mode = args.auth.unwrap_or(cfg.auth.mode);

    let access_token = auth::resolve_access_token(&cfg, mode).await?;
    let client = DriveClient::new(access_token)?;

    for check in inspect::check_all(&client, &cfg).await {
        for line in inspect::describe(&check) {
            println!("{}", line);
        }
    }
    Ok(())
}
