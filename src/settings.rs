use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{history::DEFAULT_HISTORY_LIMIT, persistence::StorageKeys};

/// Which storage variant the host wires up at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StorageMode {
    /// Session JSON file next to the local stores, tried first.
    #[default]
    Desktop,
    /// Local key-value stores only.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditSettings {
    pub history_limit: usize,
    pub autosave_interval_secs: u64,
    pub storage_mode: StorageMode,
    pub primary_key: String,
    pub backup_key: String,
    pub legacy_flag_key: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        let keys = StorageKeys::default();
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            autosave_interval_secs: 30,
            storage_mode: StorageMode::default(),
            primary_key: keys.primary,
            backup_key: keys.backup,
            legacy_flag_key: keys.legacy_flag,
        }
    }
}

impl AuditSettings {
    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys {
            primary: self.primary_key.clone(),
            backup: self.backup_key.clone(),
            legacy_flag: self.legacy_flag_key.clone(),
        }
    }

    /// `BOXAUDIT_DEBUG=1` saves every second.
    pub fn autosave_interval(&self) -> Duration {
        let debug_mode = std::env::var("BOXAUDIT_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.autosave_interval_secs.max(1))
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AuditSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                AuditSettings::default()
            })
        } else {
            AuditSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> AuditSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: AuditSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: AuditSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &AuditSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, AuditSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuditSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
