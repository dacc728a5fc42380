//! The session store paired with its undo history. Every operation that
//! changes session data records a snapshot afterwards.

use chrono::Utc;

use crate::{
    error::AuditResult,
    history::History,
    location::LocationIntent,
    models::{BoxRecord, Item, Session},
    store::{AddedItem, NormalizeReport, SessionStats, SessionStore},
};

#[derive(Debug, Clone)]
pub struct Workspace {
    store: SessionStore,
    history: History,
    /// Bumped on every session change; lets savers skip clean sessions.
    revision: u64,
}

impl Workspace {
    /// Wraps `store` and records its current session as the first snapshot.
    pub fn new(store: SessionStore, mut history: History) -> Self {
        history.clear();
        history.record(store.session());
        Self {
            store,
            history,
            revision: 0,
        }
    }

    pub fn session(&self) -> &Session {
        self.store.session()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_location(&self) -> Option<&str> {
        self.store.active_location()
    }

    pub fn stats(&self) -> SessionStats {
        self.store.stats(Utc::now())
    }

    /// Reselecting the active location with the same shelf records nothing.
    pub fn switch_location(&mut self, text: &str) -> AuditResult<LocationIntent> {
        let before = self.selection();
        let intent = self.store.switch_location(text)?;
        self.commit_if_moved(before);
        Ok(intent)
    }

    pub fn switch_to(&mut self, intent: &LocationIntent) {
        let before = self.selection();
        self.store.switch_to(intent);
        self.commit_if_moved(before);
    }

    pub fn add_item(&mut self, raw_text: &str) -> AuditResult<AddedItem> {
        let added = self.store.add_item_to_active(raw_text)?;
        self.commit();
        Ok(added)
    }

    pub fn add_item_to(&mut self, location: &str, raw_text: &str) -> AuditResult<AddedItem> {
        let tags = self.store.tags().to_vec();
        let added = self.store.add_item(location, raw_text, &tags)?;
        self.commit();
        Ok(added)
    }

    pub fn edit_item(
        &mut self,
        location: &str,
        item_id: u64,
        raw_text: &str,
    ) -> AuditResult<Option<Item>> {
        let edited = self.store.edit_item(location, item_id, raw_text)?;
        if edited.is_some() {
            self.commit();
        }
        Ok(edited)
    }

    pub fn delete_item(&mut self, location: &str, item_id: u64) -> Option<Item> {
        let removed = self.store.delete_item(location, item_id);
        if removed.is_some() {
            self.commit();
        }
        removed
    }

    pub fn delete_location(&mut self, location: &str) -> Option<BoxRecord> {
        let removed = self.store.delete_location(location);
        if removed.is_some() {
            self.commit();
        }
        removed
    }

    pub fn toggle_completion(&mut self, location: &str) -> Option<bool> {
        let completed = self.store.toggle_completion(location);
        if completed.is_some() {
            self.commit();
        }
        completed
    }

    pub fn set_secondary_location(&mut self, location: &str, shelf: Option<&str>) -> AuditResult<()> {
        self.store.set_secondary_location(location, shelf)?;
        if self.store.session().get(location).is_some() {
            self.commit();
        }
        Ok(())
    }

    pub fn normalize_all_keys(&mut self) -> NormalizeReport {
        let report = self.store.normalize_all_keys();
        if !report.is_noop() {
            self.commit();
        }
        report
    }

    pub fn migrate_legacy_completion(&mut self) -> usize {
        let migrated = self.store.migrate_legacy_completion();
        if migrated > 0 {
            self.commit();
        }
        migrated
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.store.add_tag(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.store.remove_tag(tag)
    }

    pub fn clear_tags(&mut self) {
        self.store.clear_tags();
    }

    pub fn tags(&self) -> &[String] {
        self.store.tags()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.store.replace_session(snapshot);
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.store.replace_session(snapshot);
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    /// Active key plus its record's shelf, `None` when the record is gone.
    fn selection(&self) -> (Option<String>, Option<Option<String>>) {
        let active = self.store.active_location().map(str::to_string);
        let shelf = active
            .as_deref()
            .and_then(|key| self.session().get(key))
            .map(|record| record.secondary_location.clone());
        (active, shelf)
    }

    fn commit_if_moved(&mut self, before: (Option<String>, Option<Option<String>>)) {
        if self.selection() != before {
            self.commit();
        }
    }

    fn commit(&mut self) {
        self.history.record(self.store.session());
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> Workspace {
        Workspace::new(SessionStore::new(Session::new()), History::new(10))
    }

    #[test]
    fn undo_and_redo_walk_the_snapshots() {
        let mut ws = workspace();
        ws.switch_location("box 1").unwrap();
        ws.add_item("pen").unwrap();
        ws.add_item("pen x2").unwrap();
        let before_undo = ws.session().clone();

        assert!(ws.undo());
        assert_eq!(ws.session().get("BOX001").unwrap().items[0].qty, 1);
        assert!(ws.redo());
        assert_eq!(ws.session(), &before_undo);
        assert!(!ws.redo());
    }

    #[test]
    fn no_op_operations_leave_history_alone() {
        let mut ws = workspace();
        ws.switch_location("box 1").unwrap();
        let recorded = ws.history().len();
        let revision = ws.revision();

        assert!(ws.delete_item("BOX001", 42).is_none());
        assert!(ws.toggle_completion("BOX404").is_none());
        assert!(ws.set_secondary_location("BOX001", Some("nope")).is_err());
        assert!(ws.add_item("   ").is_err());

        assert_eq!(ws.history().len(), recorded);
        assert_eq!(ws.revision(), revision);
    }

    #[test]
    fn undo_keeps_the_operator_context() {
        let mut ws = workspace();
        ws.switch_location("box 1").unwrap();
        ws.add_tag("garage");
        ws.add_item("saw").unwrap();
        ws.undo();

        assert_eq!(ws.active_location(), Some("BOX001"));
        assert_eq!(ws.tags().to_vec(), vec!["garage".to_string()]);
        let again = ws.add_item("saw").unwrap();
        assert!(!again.merged);
        assert_eq!(again.item.tags, vec!["garage"]);
    }

    #[test]
    fn undo_exhausts_at_the_initial_snapshot() {
        let mut ws = workspace();
        ws.switch_location("box 1").unwrap();
        assert!(ws.undo());
        assert!(ws.session().boxes.is_empty());
        assert!(!ws.undo());
    }

    #[test]
    fn reselecting_the_active_location_records_nothing() {
        let mut ws = workspace();
        ws.switch_location("box 4 shelf 1").unwrap();
        ws.add_item("rope").unwrap();
        let recorded = ws.history().len();
        let revision = ws.revision();

        ws.switch_location("B4").unwrap();
        ws.switch_location("4 s1").unwrap();
        assert_eq!(ws.history().len(), recorded);
        assert_eq!(ws.revision(), revision);

        // A single undo still takes back the item.
        assert!(ws.undo());
        assert!(ws.session().get("BOX004").unwrap().is_empty());

        ws.switch_location("4 shelf 2").unwrap();
        assert_eq!(ws.revision(), revision + 2);
    }
}
