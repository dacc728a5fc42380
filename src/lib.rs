//! Core of the Box Audit inventory tracker: location normalization, the
//! session store with undo history, and layered persistence.
//!
//! Hosts call [`open`] once with their data directory and drive everything
//! through the returned [`AuditController`].

pub mod app;
pub mod db;
pub mod error;
pub mod history;
pub mod location;
pub mod models;
pub mod persistence;
pub mod quantity;
pub mod settings;
pub mod store;
pub mod utils;
pub mod voice;
pub mod workspace;

use std::{path::Path, sync::Arc};

use anyhow::Result;

pub use app::AuditController;
pub use error::{AuditError, AuditResult};
pub use models::{BoxRecord, Item, Session};
pub use persistence::{LoadSource, PersistenceGateway, SaveOutcome, StorageKeys};
pub use settings::{AuditSettings, SettingsStore, StorageMode};
pub use utils::init_logging;
pub use voice::VoiceCommand;

use persistence::{JsonFileProvider, SqliteKvStore};

const PRIMARY_DB_FILE: &str = "boxaudit.sqlite3";
const BACKUP_DB_FILE: &str = "boxaudit-backup.sqlite3";
const SESSION_FILE: &str = "session.json";
const SETTINGS_FILE: &str = "settings.json";

pub struct AppState {
    pub controller: AuditController,
    pub settings: SettingsStore,
}

/// Opens storage under `app_data_dir`, restores the last session and starts
/// autosave.
pub async fn open(app_data_dir: &Path) -> Result<AppState> {
    std::fs::create_dir_all(app_data_dir)?;

    let settings = SettingsStore::new(app_data_dir.join(SETTINGS_FILE))?;
    let current = settings.current();

    let gateway = build_gateway(app_data_dir, &current)?;
    let controller = AuditController::bootstrap(Arc::new(gateway), current.history_limit).await;
    controller
        .start_autosave(current.autosave_interval())
        .await;

    log::info!("Box Audit ready in {}", app_data_dir.display());
    Ok(AppState {
        controller,
        settings,
    })
}

/// Wires the SQLite stores and, in desktop mode, the session file.
pub fn build_gateway(app_data_dir: &Path, settings: &AuditSettings) -> Result<PersistenceGateway> {
    let primary = SqliteKvStore::open(app_data_dir.join(PRIMARY_DB_FILE))?;
    let backup = SqliteKvStore::open(app_data_dir.join(BACKUP_DB_FILE))?;
    let gateway =
        PersistenceGateway::new(Arc::new(primary), Arc::new(backup), settings.storage_keys());

    Ok(match settings.storage_mode {
        StorageMode::Desktop => gateway.with_file_provider(Arc::new(JsonFileProvider::new(
            app_data_dir.join(SESSION_FILE),
        ))),
        StorageMode::Local => gateway,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reopen_restores_the_desktop_session_file() {
        let dir = TempDir::new().unwrap();

        let state = open(dir.path()).await.unwrap();
        state.controller.switch_location("b12").await.unwrap();
        state.controller.add_item("stapler (4)").await.unwrap();
        assert!(state.controller.shutdown().await.is_persisted());
        drop(state);
        assert!(dir.path().join(SESSION_FILE).exists());

        let reopened = open(dir.path()).await.unwrap();
        assert_eq!(reopened.controller.load_source(), LoadSource::File);
        assert_eq!(
            reopened.controller.active_location().await.as_deref(),
            Some("BOX012")
        );
        let stats = reopened.controller.stats().await;
        assert_eq!(stats.item_count, 4);
        reopened.controller.stop_autosave().await;
    }

    #[tokio::test]
    async fn local_mode_uses_the_sqlite_stores() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"storageMode":"local","historyLimit":5}"#,
        )
        .unwrap();

        let state = open(dir.path()).await.unwrap();
        assert_eq!(state.settings.current().history_limit, 5);
        state.controller.switch_location("shelf 4").await.unwrap();
        state.controller.shutdown().await;
        drop(state);
        assert!(!dir.path().join(SESSION_FILE).exists());

        let reopened = open(dir.path()).await.unwrap();
        assert_eq!(reopened.controller.load_source(), LoadSource::Primary);
        assert!(reopened.controller.session().await.get("SHELF 4").is_some());
        reopened.controller.stop_autosave().await;
    }
}
