//! Where raw question/answer records come from: the Stack Exchange API, or a
//! JSON snapshot kept next to the indexes.

pub mod stack_exchange;

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::RawRecord;

pub use stack_exchange::StackExchangeClient;

/// Read a records snapshot written by [`save_records`].
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse records in {}", path.display()))
}

/// Write a records snapshot, replacing any previous one.
pub fn save_records(path: &Path, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(records)?)?;
    std::fs::rename(&tmp, path).context("Failed to move records snapshot into place")?;
    Ok(())
}
