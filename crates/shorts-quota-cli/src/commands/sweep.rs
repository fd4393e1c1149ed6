use super::{CliResult, Host};

pub async fn run() -> CliResult {
    let host = Host::open().await?;
    let report = host.background.run_sweep().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
