//! Bridge transfer storage

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::info;
use crate::types::PendingBridgeTransfer;

pub fn save_bridge_transfer(transfer: &PendingBridgeTransfer) -> Result<()> {
    let filename = format!(
        "output/transfers/bridge_{}.jsonl",
        Utc::now().format("%Y-%m-%d")
    );

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)?;

    writeln!(file, "{}", serde_json::to_string(transfer)?)?;

    info!(
        transfer_id = %transfer.id,
        bridge = %transfer.route.bridge,
        state = ?transfer.state,
        "Saved bridge transfer"
    );

    Ok(())
}
