use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::provider::{KeyValueStore, SessionFileProvider};
use crate::{models::Session, store::repair_session};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Where each piece of persisted state lives inside the key-value stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub primary: String,
    pub backup: String,
    pub legacy_flag: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            primary: "boxAuditSession".into(),
            backup: "boxAuditSession_backup".into(),
            legacy_flag: "boxAuditLegacyCompletionMigrated".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadSource {
    File,
    Primary,
    Backup,
    /// Nothing usable was stored; a new session was started.
    Fresh,
}

#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub session: Session,
    pub source: LoadSource,
}

impl LoadedSession {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            session: Session::started_at(now),
            source: LoadSource::Fresh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveTarget {
    File,
    Primary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SaveOutcome {
    Saved { target: SaveTarget },
    /// Primary storage failed; the session only reached the backup store.
    Degraded { warning: String },
    Failed { warning: String },
    /// Another save was in flight; it will run again once it finishes.
    Deferred,
}

impl SaveOutcome {
    pub fn warning(&self) -> Option<&str> {
        match self {
            SaveOutcome::Degraded { warning } | SaveOutcome::Failed { warning } => Some(warning),
            SaveOutcome::Saved { .. } | SaveOutcome::Deferred => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. } | SaveOutcome::Degraded { .. })
    }
}

/// Reads and writes the session across the desktop file (when the host has
/// one) and the primary/backup key-value stores.
pub struct PersistenceGateway {
    file: Option<Arc<dyn SessionFileProvider>>,
    primary: Arc<dyn KeyValueStore>,
    backup: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl PersistenceGateway {
    pub fn new(
        primary: Arc<dyn KeyValueStore>,
        backup: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            file: None,
            primary,
            backup,
            keys,
        }
    }

    pub fn with_file_provider(mut self, file: Arc<dyn SessionFileProvider>) -> Self {
        self.file = Some(file);
        self
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Loads the stored session: desktop file, then primary, then backup.
    ///
    /// Data without a box map is discarded in favour of a fresh session.
    /// Unparseable data falls back to the backup store; only when that fails
    /// too is an error returned, and the caller should start fresh.
    pub async fn load(&self) -> Result<LoadedSession> {
        let now = Utc::now();

        if let Some(file) = &self.file {
            match file.load().await {
                Ok(Some(text)) => return self.decode_or_backup(&text, LoadSource::File, now).await,
                Ok(None) => {}
                Err(err) => log_warn!("session file unavailable, trying local storage: {err:#}"),
            }
        }

        match self.primary.get(&self.keys.primary).await {
            Ok(Some(text)) => return self.decode_or_backup(&text, LoadSource::Primary, now).await,
            Ok(None) => {}
            Err(err) => log_warn!("primary storage read failed: {err:#}"),
        }

        if let Some(loaded) = self.load_backup(now).await? {
            return Ok(loaded);
        }

        log_info!("no stored session found; starting fresh");
        Ok(LoadedSession::fresh(now))
    }

    /// Saves the session, degrading to the backup store rather than failing.
    pub async fn save(&self, session: &Session) -> SaveOutcome {
        let json = match serde_json::to_string(session) {
            Ok(json) => json,
            Err(err) => {
                log_error!("failed to serialize session {}: {err}", session.id);
                return SaveOutcome::Failed {
                    warning: format!("Session could not be serialized: {err}"),
                };
            }
        };

        if let Some(file) = &self.file {
            match file.save(&json).await {
                Ok(()) => {
                    return SaveOutcome::Saved {
                        target: SaveTarget::File,
                    }
                }
                Err(err) => log_warn!("session file save failed, using local storage: {err:#}"),
            }
        }

        let primary_err = match self.write_verified(&json).await {
            Ok(()) => {
                return SaveOutcome::Saved {
                    target: SaveTarget::Primary,
                }
            }
            Err(err) => err,
        };
        log_warn!("primary storage save failed, writing backup: {primary_err:#}");

        match self.backup.set(&self.keys.backup, &json).await {
            Ok(()) => SaveOutcome::Degraded {
                warning: format!(
                    "Storage problem: session saved to backup only ({primary_err}). Export soon."
                ),
            },
            Err(backup_err) => {
                log_error!("backup storage save failed: {backup_err:#}");
                SaveOutcome::Failed {
                    warning: format!(
                        "Session could not be saved ({primary_err}; backup: {backup_err})."
                    ),
                }
            }
        }
    }

    pub async fn legacy_migration_done(&self) -> bool {
        match self.primary.get(&self.keys.legacy_flag).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                log_warn!("could not read legacy migration flag: {err:#}");
                false
            }
        }
    }

    pub async fn mark_legacy_migration_done(&self) -> Result<()> {
        self.primary.set(&self.keys.legacy_flag, "true").await
    }

    async fn write_verified(&self, json: &str) -> Result<()> {
        self.primary.set(&self.keys.primary, json).await?;
        let stored = self.primary.get(&self.keys.primary).await?;
        if stored.as_deref() != Some(json) {
            bail!("read-back verification failed");
        }
        Ok(())
    }

    async fn decode_or_backup(
        &self,
        text: &str,
        source: LoadSource,
        now: DateTime<Utc>,
    ) -> Result<LoadedSession> {
        match decode(text, source, now) {
            Ok(loaded) => Ok(loaded),
            Err(err) => {
                log_warn!("stored session from {source:?} is corrupt ({err}); trying backup");
                self.load_backup(now).await?.ok_or_else(|| {
                    anyhow!("stored session is corrupt and no backup is available: {err}")
                })
            }
        }
    }

    /// Reads the backup store, promoting usable content into the primary.
    async fn load_backup(&self, now: DateTime<Utc>) -> Result<Option<LoadedSession>> {
        let text = match self.backup.get(&self.keys.backup).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(None),
            Err(err) => {
                log_warn!("backup storage read failed: {err:#}");
                return Ok(None);
            }
        };

        let loaded = decode(&text, LoadSource::Backup, now)
            .map_err(|err| anyhow!("backup session is corrupt: {err}"))?;

        if loaded.source == LoadSource::Backup {
            match self.primary.set(&self.keys.primary, &text).await {
                Ok(()) => log_info!("restored session from backup storage"),
                Err(err) => log_warn!("could not promote backup into primary storage: {err:#}"),
            }
        }
        Ok(Some(loaded))
    }
}

fn decode(
    text: &str,
    source: LoadSource,
    now: DateTime<Utc>,
) -> Result<LoadedSession, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    match repair_session(&value, now) {
        Some(session) => Ok(LoadedSession { session, source }),
        None => {
            log_warn!("stored session from {source:?} has no box map; discarding it");
            Ok(LoadedSession::fresh(now))
        }
    }
}
