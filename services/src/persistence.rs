// Copyright (c) 2024 Mike Tsao. All rights reserved.

use std::{fs::File, io::Write, path::PathBuf};
use trackwave_core::store::SnapshotStore;

/// Keeps the [SnapshotStore] on disk so that a restarted show picks up where
/// it left off.
#[derive(Debug)]
pub struct Persistence {
    path: PathBuf,
}
impl Persistence {
    #[allow(missing_docs)]
    pub const DEFAULT_FILENAME: &'static str = "playdata2.json";

    #[allow(missing_docs)]
    pub fn new_with(path: PathBuf) -> Self {
        Self { path }
    }

    #[allow(missing_docs)]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the saved store. `Ok(None)` means there was nothing to restore.
    pub fn load(&self) -> anyhow::Result<Option<SnapshotStore>> {
        let path = &self.path;
        if !path.exists() {
            log::info!("No saved state at {path:?}; starting fresh");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        let store = serde_json::from_str(&contents)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))?;
        log::info!("Restored state from {path:?}");
        Ok(Some(store))
    }

    /// Writes the store to a sibling temp file, then renames it over the
    /// target. A crash mid-write leaves the previous file intact.
    pub fn save(&self, store: &SnapshotStore) -> anyhow::Result<()> {
        let path = &self.path;
        let json = serde_json::to_string(store)
            .map_err(|_| anyhow::format_err!("Unable to serialize state JSON"))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                anyhow::format_err!("Unable to create {path:?} parent directories: {}", e)
            })?;
        }

        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);
        let mut file = File::create(&temp_path)
            .map_err(|e| anyhow::format_err!("Unable to create {temp_path:?}: {}", e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| anyhow::format_err!("Unable to write {temp_path:?}: {}", e))?;
        file.sync_all()
            .map_err(|e| anyhow::format_err!("Unable to flush {temp_path:?}: {}", e))?;
        std::fs::rename(&temp_path, path)
            .map_err(|e| anyhow::format_err!("Unable to replace {path:?}: {}", e))?;
        Ok(())
    }
}
