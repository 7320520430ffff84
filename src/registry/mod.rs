//! Durable local market registry
//!
//! Two layers back the registry: one JSON record per market
//! (`markets/<conditionId>.json`, [`record_store`]) and a master index
//! (`markets/registry.json`, [`index`]). The index is a projection of the
//! records; the scanner repairs any drift between the two after a crash.

pub mod index;
pub mod record_store;

pub use index::*;
pub use record_store::*;

use serde::Serialize;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::Result;

/// Serialize `value` and atomically replace `path`: write a uuid-suffixed
/// temp file in the same directory, then rename over the target. A crash at
/// any point leaves either the old file or the new one, never a partial
/// write.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("registry");
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp, json)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
