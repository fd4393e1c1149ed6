use super::{CliResult, Host};

pub async fn run() -> CliResult {
    let host = Host::open().await?;
    let view = host.panel()?.load().await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
