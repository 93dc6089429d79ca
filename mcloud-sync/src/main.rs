use std::path::PathBuf;

use mcloud_core::{CatalogMode, Credential, McloudClient, RefreshClient, Session};
use mcloud_sync::config::Config;
use mcloud_sync::engine::SyncEngine;

const DEFAULT_CONFIG_PATH: &str = "/app_config/config.json";

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run { config_path: PathBuf },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path: Option<PathBuf> = None;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliMode::Help),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other => {
                if config_path.is_some() {
                    anyhow::bail!("expected a single config path argument");
                }
                config_path = Some(PathBuf::from(other));
            }
        }
    }
    Ok(CliMode::Run {
        config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: mcloud-sync [CONFIG]");
            println!("  CONFIG   Path to the JSON config file (default: {DEFAULT_CONFIG_PATH})");
            return Ok(());
        }
        CliMode::Run { config_path } => config_path,
    };

    let mut config = Config::load(&config_path)?;
    let mut credential = Credential::parse(&config.authorization)?;

    let refresh = RefreshClient::new()?;
    if let Some(fresh) = refresh.ensure_fresh_now(&credential).await? {
        config.authorization = fresh.encode();
        config.save(&config_path)?;
        eprintln!("[mcloud-sync] credential refreshed and persisted");
        credential = fresh;
    } else {
        eprintln!("[mcloud-sync] credential still valid, refresh skipped");
    }

    let session = Session {
        credential,
        account: config.account.clone(),
        cloud_id: config.cloud_id.clone(),
        catalog_id: config.catalog_id.clone(),
        mode: CatalogMode::Family,
    };
    let client = McloudClient::new(session)?;
    let engine = SyncEngine::new(client, config.target_dir.clone(), config.create_time_utc);

    eprintln!("[mcloud-sync] mirroring catalog {}", config.catalog_id);
    let report = engine.run().await?;
    eprintln!(
        "[mcloud-sync] done: {} listed, {} up to date, {} downloaded",
        report.listed, report.up_to_date, report.downloaded
    );
    Ok(())
}
