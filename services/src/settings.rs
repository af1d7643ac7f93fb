// Copyright (c) 2024 Mike Tsao. All rights reserved.

use std::{fs::File, io::Read, path::PathBuf, time::SystemTime};
use trackwave_core::settings::ShowSettings;

/// Watches the show settings file and reloads it when its modification time
/// changes. Each successful reload bumps [SettingsWatcher::generation()], so
/// consumers can tell they're looking at new settings.
#[derive(Debug)]
pub struct SettingsWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
    settings: ShowSettings,
    generation: u64,
}
impl SettingsWatcher {
    #[allow(missing_docs)]
    pub const DEFAULT_FILENAME: &'static str = "settings.json";

    /// Starts with defaults. Call [SettingsWatcher::poll()] to read the file.
    pub fn new_with(path: PathBuf) -> Self {
        Self {
            path,
            modified: None,
            settings: Default::default(),
            generation: 0,
        }
    }

    #[allow(missing_docs)]
    pub fn settings(&self) -> &ShowSettings {
        &self.settings
    }

    /// Increments on every successful reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reloads the file if it changed since the last poll. Returns whether
    /// the settings were replaced.
    ///
    /// A missing file keeps the current settings. A file that can't be parsed
    /// is an error, but its modification time is remembered so it's reported
    /// only once per edit.
    pub fn poll(&mut self) -> anyhow::Result<bool> {
        let path = &self.path;
        let Ok(metadata) = std::fs::metadata(path) else {
            return Ok(false);
        };
        let modified = metadata.modified().ok();
        if modified.is_some() && modified == self.modified {
            return Ok(false);
        }
        self.modified = modified;

        let mut contents = String::new();
        File::open(path)
            .map_err(|e| anyhow::format_err!("Couldn't open {path:?}: {}", e))?
            .read_to_string(&mut contents)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        let settings: ShowSettings = serde_json::from_str(&contents)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))?;

        log::info!("Loaded settings from {path:?}");
        log::debug!("{settings:?}");
        self.settings = settings;
        self.generation += 1;
        Ok(true)
    }
}
