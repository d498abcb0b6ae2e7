//! Persisted database metadata (`DB.META`)

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the persisted metadata inside the database directory
pub const META_FILE_NAME: &str = "DB.META";

/// Write offsets of the active files and reclaimable bytes per segment
///
/// Both are advisory. Recovery recomputes them by scanning the segments and
/// only warns when a persisted write offset disagrees with the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMeta {
    /// data type tag → write offset of that type's active file
    #[serde(default)]
    pub active_write_off: BTreeMap<u8, u64>,

    /// string segment file id → bytes of superseded or removed records
    #[serde(default)]
    pub reclaimable_space: BTreeMap<u32, i64>,
}

impl DbMeta {
    /// Load from `dir/DB.META`; a missing file yields empty metadata
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(META_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write to `dir/DB.META` via a temp file + rename
    pub fn store(&self, dir: &Path) -> Result<()> {
        let path = dir.join(META_FILE_NAME);
        let tmp = dir.join(format!("{}.tmp", META_FILE_NAME));
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
