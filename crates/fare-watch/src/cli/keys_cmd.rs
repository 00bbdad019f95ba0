// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Print the search keys a monitor would poll.

use anyhow::Result;
use fare_watch::config::MonitorConfig;

pub fn run(cfg: &MonitorConfig, json: bool) -> Result<()> {
    let keys = cfg.validate()?;

    if json {
        let rows: Vec<serde_json::Value> = keys
            .iter()
            .map(|(key, url)| {
                serde_json::json!({
                    "key": key.to_string(),
                    "depart": key.depart_date,
                    "return": key.return_date,
                    "days": key.trip_length(),
                    "url": url,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (index, (key, url)) in keys.iter().enumerate() {
        println!("{index:>3}  {key}  {:>2}d  {url}", key.trip_length());
    }
    println!();
    println!("{} searches", keys.len());
    Ok(())
}
