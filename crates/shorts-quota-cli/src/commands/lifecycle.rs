use clap::Subcommand;
use serde_json::json;
use shorts_quota_core::{InstallReason, MAINTENANCE_ALARM};

use super::{CliResult, Host};

#[derive(Subcommand)]
pub enum LifecycleAction {
    /// First install: write default settings
    Install,
    /// Extension update: fill in missing settings only
    Update,
    /// Background start: register the maintenance alarm
    Startup,
}

pub async fn run(action: LifecycleAction) -> CliResult {
    let host = Host::open().await?;
    match action {
        LifecycleAction::Install => {
            host.background.on_installed(InstallReason::Install).await?;
            println!("defaults written");
        }
        LifecycleAction::Update => {
            host.background.on_installed(InstallReason::Update).await?;
            println!("settings back-filled");
        }
        LifecycleAction::Startup => {
            host.background.on_startup().await;
            let badge = host.background.refresh_badge(None).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "alarm": MAINTENANCE_ALARM,
                    "periodMinutes": host.config.retention.sweep_period_min,
                    "badge": badge,
                }))?
            );
        }
    }
    Ok(())
}
