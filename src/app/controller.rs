use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Mutex;

use super::{autosave::AutoSaver, scheduler::SaveScheduler};
use crate::{
    error::AuditResult,
    history::History,
    location::LocationIntent,
    models::{BoxRecord, Item, Session},
    persistence::{LoadSource, LoadedSession, PersistenceGateway, SaveOutcome},
    store::{AddedItem, SessionStats, SessionStore},
    voice::{classify_transcript, VoiceCommand},
    workspace::Workspace,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Entry point for the UI and voice layers. Owns the live workspace; every
/// mutation completes under one lock and is followed by a save request.
#[derive(Clone)]
pub struct AuditController {
    workspace: Arc<Mutex<Workspace>>,
    scheduler: SaveScheduler,
    autosave: Arc<Mutex<Option<AutoSaver>>>,
    load_source: LoadSource,
}

impl AuditController {
    /// Loads the stored session and brings it up to date: canonical keys,
    /// the one-time legacy completion pass, and the most recent location
    /// selected. Storage problems fall back to a fresh session.
    pub async fn bootstrap(gateway: Arc<PersistenceGateway>, history_limit: usize) -> Self {
        let loaded = match gateway.load().await {
            Ok(loaded) => loaded,
            Err(err) => {
                log_error!("could not load stored session, starting fresh: {err:#}");
                LoadedSession::fresh(Utc::now())
            }
        };
        let load_source = loaded.source;
        log_info!(
            "session {} loaded from {:?} with {} locations",
            loaded.session.id,
            load_source,
            loaded.session.boxes.len()
        );

        let mut store = SessionStore::new(loaded.session);
        let report = store.normalize_all_keys();
        let mut dirty = !report.is_noop();
        if dirty {
            log_info!(
                "normalized location keys: {} rekeyed, {} merged",
                report.rekeyed,
                report.merged
            );
        }

        if !gateway.legacy_migration_done().await {
            let migrated = store.migrate_legacy_completion();
            if migrated > 0 {
                log_info!("marked {migrated} existing boxes as completed");
                dirty = true;
            }
            if let Err(err) = gateway.mark_legacy_migration_done().await {
                log_warn!("could not persist legacy migration flag: {err:#}");
            }
        }

        store.restore_active_location();

        let workspace = Arc::new(Mutex::new(Workspace::new(store, History::new(history_limit))));
        let controller = Self {
            scheduler: SaveScheduler::new(workspace.clone(), gateway),
            workspace,
            autosave: Arc::new(Mutex::new(None)),
            load_source,
        };

        if dirty {
            controller.scheduler.mark_dirty();
            controller.scheduler.request_save().await;
        }
        controller
    }

    pub fn load_source(&self) -> LoadSource {
        self.load_source
    }

    pub async fn session(&self) -> Session {
        self.workspace.lock().await.session().clone()
    }

    pub async fn stats(&self) -> SessionStats {
        self.workspace.lock().await.stats()
    }

    pub async fn active_location(&self) -> Option<String> {
        self.workspace
            .lock()
            .await
            .active_location()
            .map(str::to_string)
    }

    pub async fn tags(&self) -> Vec<String> {
        self.workspace.lock().await.tags().to_vec()
    }

    pub async fn can_undo(&self) -> bool {
        self.workspace.lock().await.history().can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.workspace.lock().await.history().can_redo()
    }

    pub async fn switch_location(&self, text: &str) -> AuditResult<LocationIntent> {
        self.mutate(|ws| ws.switch_location(text)).await
    }

    pub async fn add_item(&self, raw_text: &str) -> AuditResult<AddedItem> {
        self.mutate(|ws| ws.add_item(raw_text)).await
    }

    pub async fn add_item_to(&self, location: &str, raw_text: &str) -> AuditResult<AddedItem> {
        self.mutate(|ws| ws.add_item_to(location, raw_text)).await
    }

    pub async fn edit_item(
        &self,
        location: &str,
        item_id: u64,
        raw_text: &str,
    ) -> AuditResult<Option<Item>> {
        self.mutate(|ws| ws.edit_item(location, item_id, raw_text))
            .await
    }

    pub async fn delete_item(&self, location: &str, item_id: u64) -> Option<Item> {
        self.mutate(|ws| ws.delete_item(location, item_id)).await
    }

    pub async fn delete_location(&self, location: &str) -> Option<BoxRecord> {
        self.mutate(|ws| ws.delete_location(location)).await
    }

    pub async fn toggle_completion(&self, location: &str) -> Option<bool> {
        self.mutate(|ws| ws.toggle_completion(location)).await
    }

    pub async fn set_secondary_location(
        &self,
        location: &str,
        shelf: Option<&str>,
    ) -> AuditResult<()> {
        self.mutate(|ws| ws.set_secondary_location(location, shelf))
            .await
    }

    pub async fn add_tag(&self, tag: &str) -> bool {
        self.workspace.lock().await.add_tag(tag)
    }

    pub async fn remove_tag(&self, tag: &str) -> bool {
        self.workspace.lock().await.remove_tag(tag)
    }

    pub async fn clear_tags(&self) {
        self.workspace.lock().await.clear_tags();
    }

    pub async fn undo(&self) -> bool {
        self.mutate(Workspace::undo).await
    }

    pub async fn redo(&self) -> bool {
        self.mutate(Workspace::redo).await
    }

    /// Explicit save, sharing the re-entrancy guard with autosave.
    pub async fn save(&self) -> SaveOutcome {
        self.scheduler.request_save().await
    }

    /// Result of the most recent save that reached storage; carries the
    /// warning to show when persistence is degraded.
    pub fn last_save_outcome(&self) -> Option<SaveOutcome> {
        self.scheduler.last_outcome()
    }

    /// Classifies a transcript and runs it like the equivalent key command.
    pub async fn apply_voice_transcript(&self, transcript: &str) -> VoiceCommand {
        let command = classify_transcript(transcript);
        match &command {
            VoiceCommand::Undo => {
                self.undo().await;
            }
            VoiceCommand::Redo => {
                self.redo().await;
            }
            VoiceCommand::ClearTags => self.clear_tags().await,
            VoiceCommand::Location(intent) => {
                self.mutate(|ws| ws.switch_to(intent)).await;
            }
            VoiceCommand::Tag(tag) => {
                self.add_tag(tag).await;
            }
            VoiceCommand::Ignored => {}
        }
        command
    }

    pub async fn start_autosave(&self, interval: Duration) {
        let mut slot = self.autosave.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }
        *slot = Some(AutoSaver::start(self.scheduler.clone(), interval));
        log_info!("autosave every {}s", interval.as_secs());
    }

    pub async fn stop_autosave(&self) {
        if let Some(saver) = self.autosave.lock().await.take() {
            saver.stop().await;
        }
    }

    /// Stops autosave and writes the session one last time.
    pub async fn shutdown(&self) -> SaveOutcome {
        self.stop_autosave().await;
        self.save().await
    }

    async fn mutate<T, F>(&self, op: F) -> T
    where
        F: FnOnce(&mut Workspace) -> T,
    {
        let (result, changed) = {
            let mut workspace = self.workspace.lock().await;
            let before = workspace.revision();
            let result = op(&mut *workspace);
            (result, workspace.revision() != before)
        };

        if changed {
            self.scheduler.request_save().await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{KeyValueStore, MemoryKvStore, SaveTarget, StorageKeys};

    fn gateway_over(primary: Arc<MemoryKvStore>) -> Arc<PersistenceGateway> {
        Arc::new(PersistenceGateway::new(
            primary,
            Arc::new(MemoryKvStore::new()),
            StorageKeys::default(),
        ))
    }

    #[tokio::test]
    async fn mutations_are_saved_and_survive_a_restart() {
        let primary = Arc::new(MemoryKvStore::new());
        let controller = AuditController::bootstrap(gateway_over(primary.clone()), 50).await;
        assert_eq!(controller.load_source(), LoadSource::Fresh);

        controller.switch_location("42 shelf 2c").await.unwrap();
        controller.add_item("pen").await.unwrap();
        controller.add_item("pen x2").await.unwrap();
        assert_eq!(
            controller.last_save_outcome(),
            Some(SaveOutcome::Saved {
                target: SaveTarget::Primary
            })
        );

        let restarted = AuditController::bootstrap(gateway_over(primary), 50).await;
        assert_eq!(restarted.load_source(), LoadSource::Primary);
        assert_eq!(restarted.active_location().await.as_deref(), Some("BOX042"));
        let session = restarted.session().await;
        let record = session.get("BOX042").unwrap();
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].qty, 3);
        assert_eq!(record.secondary_location.as_deref(), Some("SHELF 2C"));
        // Legacy migration already ran on the first start.
        assert!(!record.completed);
    }

    #[tokio::test]
    async fn bootstrap_normalizes_and_migrates_legacy_data() {
        let primary = Arc::new(MemoryKvStore::new());
        primary
            .set(
                "boxAuditSession",
                r#"{"id":"legacy","startedAt":null,"boxes":{
                    "Box42":{"items":[{"id":1,"name":"pen","qty":1,"addedAt":"2024-01-01T00:00:00Z","isDuplicate":false,"tags":[]}]},
                    "BOX042":{"items":[{"id":2,"name":"cup","qty":2,"addedAt":"2024-01-01T00:00:00Z","isDuplicate":false,"tags":[]}],"completed":false,"completedAt":null,"secondaryLocation":null},
                    "shelf 1":{"items":[]}
                }}"#,
            )
            .await
            .unwrap();

        let controller = AuditController::bootstrap(gateway_over(primary.clone()), 50).await;
        let session = controller.session().await;
        assert_eq!(session.id, "legacy");
        assert_eq!(session.boxes.keys().collect::<Vec<_>>(), vec!["BOX042", "SHELF 1"]);
        let merged = session.get("BOX042").unwrap();
        assert_eq!(merged.items.len(), 2);
        assert!(merged.completed);
        assert!(!session.get("SHELF 1").unwrap().completed);
        assert_eq!(controller.active_location().await.as_deref(), Some("SHELF 1"));

        let stored = primary.get("boxAuditSession").await.unwrap().unwrap();
        assert!(stored.contains("\"BOX042\""));
        assert!(!stored.contains("Box42"));
        assert_eq!(
            primary
                .get("boxAuditLegacyCompletionMigrated")
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn unreadable_storage_starts_a_usable_fresh_session() {
        let primary = Arc::new(MemoryKvStore::new());
        let backup = Arc::new(MemoryKvStore::new());
        primary.set("boxAuditSession", "{not json").await.unwrap();
        backup.set("boxAuditSession_backup", "{not json").await.unwrap();
        let gateway = Arc::new(PersistenceGateway::new(
            primary.clone(),
            backup,
            StorageKeys::default(),
        ));

        let controller = AuditController::bootstrap(gateway, 50).await;
        assert_eq!(controller.load_source(), LoadSource::Fresh);
        assert!(controller.session().await.boxes.is_empty());
        assert_eq!(controller.active_location().await, None);

        let intent = controller.switch_location("box 5").await.unwrap();
        assert_eq!(intent.primary, "BOX005");
        let stored = primary.get("boxAuditSession").await.unwrap().unwrap();
        assert!(stored.contains("BOX005"));
    }

    #[tokio::test]
    async fn voice_commands_drive_the_same_operations() {
        let controller =
            AuditController::bootstrap(gateway_over(Arc::new(MemoryKvStore::new())), 50).await;

        controller.apply_voice_transcript("go to box 7").await;
        controller.apply_voice_transcript("fragile").await;
        controller.add_item("vase").await.unwrap();
        assert_eq!(controller.tags().await, vec!["fragile"]);

        let command = controller.apply_voice_transcript("scratch that").await;
        assert_eq!(command, VoiceCommand::Undo);
        assert!(controller.session().await.get("BOX007").unwrap().is_empty());
        assert!(controller.can_redo().await);

        controller.apply_voice_transcript("clear tags").await;
        assert!(controller.tags().await.is_empty());
    }

    #[tokio::test]
    async fn validation_failures_do_not_save() {
        let controller =
            AuditController::bootstrap(gateway_over(Arc::new(MemoryKvStore::new())), 50).await;
        assert!(controller.add_item("pen").await.is_err());
        assert!(controller.switch_location("  ").await.is_err());
        assert_eq!(controller.last_save_outcome(), None);
    }

    #[tokio::test]
    async fn shutdown_stops_autosave_and_saves() {
        let controller =
            AuditController::bootstrap(gateway_over(Arc::new(MemoryKvStore::new())), 50).await;
        controller.start_autosave(Duration::from_secs(3600)).await;
        controller.start_autosave(Duration::from_secs(3600)).await;
        assert!(controller.shutdown().await.is_persisted());
    }
}
