use clap::ValueEnum;
use serde_json::json;

use super::{CliResult, Host};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

pub async fn limit(value: i64) -> CliResult {
    let host = Host::open().await?;
    let max = host.panel()?.set_max_shorts(value).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "maxShorts": max, "badge": host.badge.text() }))?
    );
    Ok(())
}

pub async fn set_enabled(enabled: bool) -> CliResult {
    let host = Host::open().await?;
    let report = host.panel()?.set_enabled(enabled).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "enabled": enabled, "tabs": report }))?
    );
    Ok(())
}

pub async fn toggle() -> CliResult {
    let host = Host::open().await?;
    let enabled = host.panel()?.toggle().await?;
    println!("{}", serde_json::to_string_pretty(&json!({ "enabled": enabled }))?);
    Ok(())
}

pub async fn badge(state: Switch) -> CliResult {
    let host = Host::open().await?;
    let enabled = matches!(state, Switch::On);
    host.panel()?.set_badge_enabled(enabled).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "badgeEnabled": enabled, "badge": host.badge.text() }))?
    );
    Ok(())
}

pub async fn reset() -> CliResult {
    let host = Host::open().await?;
    let report = host.panel()?.reset_count().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "count": 0, "tabs": report, "badge": host.badge.text() }))?
    );
    Ok(())
}
