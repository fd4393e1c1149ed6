use serde::Serialize;

use super::{CliResult, Host};

#[derive(Serialize)]
struct DayCount {
    key: String,
    date: Option<String>,
    count: u64,
}

pub async fn run(json: bool) -> CliResult {
    let host = Host::open().await?;
    let days: Vec<DayCount> = host
        .panel()?
        .history()
        .await?
        .into_iter()
        .map(|(day, count)| DayCount {
            key: day.to_string(),
            date: day.date().map(|d| d.to_string()),
            count,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }
    if days.is_empty() {
        println!("no counters stored");
    }
    for day in &days {
        println!("{}  {:>4}", day.date.as_deref().unwrap_or(&day.key), day.count);
    }
    Ok(())
}
