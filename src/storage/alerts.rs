//! Risk alert storage

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use crate::types::RiskAlert;

pub fn save_risk_alert(alert: &RiskAlert) -> Result<()> {
    let filename = format!(
        "output/alerts/alerts_{}.jsonl",
        Utc::now().format("%Y-%m-%d")
    );

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)?;

    writeln!(file, "{}", serde_json::to_string(alert)?)?;

    Ok(())
}
