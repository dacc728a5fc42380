//! The live session plus the operator's current context (active location and
//! voice tags). All mutation of box records goes through here.

mod normalize;
mod repair;
mod stats;

pub use normalize::{merge_records, normalize_boxes, NormalizeReport};
pub use repair::{repair_session, repair_shape};
pub use stats::SessionStats;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{AuditError, AuditResult},
    location::{normalize_location, normalize_shelf, parse_combined, LocationIntent},
    models::{session::name_key, BoxRecord, Item, Session},
    quantity::parse_quantity,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
    pub item: Item,
    /// True when the text matched an existing item and only bumped its quantity.
    pub merged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    session: Session,
    active_location: Option<String>,
    active_tags: Vec<String>,
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            active_location: None,
            active_tags: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn active_location(&self) -> Option<&str> {
        self.active_location.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.active_tags
    }

    /// Swaps in a whole session (undo/redo, reload). The active location and
    /// tags describe the operator, not the data, so they survive.
    pub fn replace_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn ensure_location_exists(&mut self, key: &str) -> &mut BoxRecord {
        self.session.boxes.entry(key.to_string()).or_default()
    }

    /// Selects the last location in insertion order, used after a load.
    pub fn restore_active_location(&mut self) -> Option<&str> {
        self.active_location = self.session.most_recent_key().map(str::to_string);
        self.active_location.as_deref()
    }

    /// Makes the location named by `text` active, creating it when needed.
    ///
    /// Accepts combined input like `"42 shelf 2C"`; the shelf becomes the
    /// box's secondary location. An empty previously-active record is dropped.
    pub fn switch_location(&mut self, text: &str) -> AuditResult<LocationIntent> {
        let intent = parse_combined(text)
            .or_else(|| {
                normalize_location(text).map(|primary| LocationIntent {
                    primary,
                    secondary: None,
                })
            })
            .ok_or(AuditError::EmptyLocation)?;
        self.switch_to(&intent);
        Ok(intent)
    }

    /// Activates an already-parsed location, e.g. one from a voice command.
    pub fn switch_to(&mut self, intent: &LocationIntent) {
        let previous = self.active_location.replace(intent.primary.clone());
        if let Some(previous) = previous {
            if previous != intent.primary {
                self.evict_if_idle(&previous);
            }
        }

        let record = self.ensure_location_exists(&intent.primary);
        if let Some(shelf) = &intent.secondary {
            record.secondary_location = Some(shelf.clone());
        }
    }

    pub fn add_item(
        &mut self,
        location: &str,
        raw_text: &str,
        tags: &[String],
    ) -> AuditResult<AddedItem> {
        let parsed = parse_quantity(raw_text);
        if parsed.name.is_empty() {
            return Err(AuditError::EmptyItemName);
        }

        let now = Utc::now();
        let record = self.ensure_location_exists(location);

        if let Some(position) = record.position_by_name(&parsed.name) {
            let mut item = record.items.remove(position);
            item.qty = item.qty.saturating_add(parsed.qty);
            item.added_at = now;
            item.is_duplicate = false;
            record.items.push(item.clone());
            return Ok(AddedItem { item, merged: true });
        }

        let mut item = Item::new(parsed.name, parsed.qty, tags.to_vec(), now);
        while record.position_by_id(item.id).is_some() {
            item.id = item.id.wrapping_add(1);
        }
        record.items.push(item.clone());
        Ok(AddedItem {
            item,
            merged: false,
        })
    }

    /// `add_item` against the active location with the active tags.
    pub fn add_item_to_active(&mut self, raw_text: &str) -> AuditResult<AddedItem> {
        let location = self
            .active_location
            .clone()
            .ok_or(AuditError::NoActiveLocation)?;
        let tags = self.active_tags.clone();
        self.add_item(&location, raw_text, &tags)
    }

    /// Rewrites an item from fresh text. A new name that matches another item
    /// folds the edited entry into that item.
    pub fn edit_item(
        &mut self,
        location: &str,
        item_id: u64,
        raw_text: &str,
    ) -> AuditResult<Option<Item>> {
        let parsed = parse_quantity(raw_text);
        if parsed.name.is_empty() {
            return Err(AuditError::EmptyItemName);
        }

        let Some(record) = self.session.get_mut(location) else {
            return Ok(None);
        };
        let Some(position) = record.position_by_id(item_id) else {
            return Ok(None);
        };

        let wanted = name_key(&parsed.name);
        let collision = record
            .items
            .iter()
            .position(|item| item.id != item_id && name_key(&item.name) == wanted);

        match collision {
            Some(other) => {
                record.items.remove(position);
                let other = if other > position { other - 1 } else { other };
                let target = &mut record.items[other];
                target.qty = target.qty.saturating_add(parsed.qty);
                target.added_at = Utc::now();
                Ok(Some(target.clone()))
            }
            None => {
                let item = &mut record.items[position];
                item.name = parsed.name;
                item.qty = parsed.qty;
                Ok(Some(item.clone()))
            }
        }
    }

    /// Removes an item by id. Missing ids are ignored.
    pub fn delete_item(&mut self, location: &str, item_id: u64) -> Option<Item> {
        let record = self.session.get_mut(location)?;
        let position = record.position_by_id(item_id)?;
        let removed = record.items.remove(position);
        self.evict_if_idle(location);
        Some(removed)
    }

    pub fn delete_location(&mut self, location: &str) -> Option<BoxRecord> {
        let removed = self.session.boxes.shift_remove(location)?;
        if self.active_location.as_deref() == Some(location) {
            self.active_location = None;
        }
        Some(removed)
    }

    /// Flips the completion flag, returning the new state.
    pub fn toggle_completion(&mut self, location: &str) -> Option<bool> {
        let record = self.session.get_mut(location)?;
        let completed = !record.completed;
        record.set_completed(completed, Utc::now());
        Some(completed)
    }

    /// Records which shelf a box sits on. Blank or `None` clears it.
    pub fn set_secondary_location(
        &mut self,
        location: &str,
        shelf: Option<&str>,
    ) -> AuditResult<()> {
        let shelf = match shelf.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(
                normalize_shelf(value).ok_or_else(|| AuditError::InvalidShelf(value.to_string()))?,
            ),
            None => None,
        };

        if let Some(record) = self.session.get_mut(location) {
            record.secondary_location = shelf;
        }
        Ok(())
    }

    /// Re-keys every record through the location normalizer, merging records
    /// whose keys collapse to the same canonical key.
    pub fn normalize_all_keys(&mut self) -> NormalizeReport {
        let boxes = std::mem::take(&mut self.session.boxes);
        let (boxes, report) = normalize_boxes(boxes);
        self.session.boxes = boxes;

        if let Some(active) = self.active_location.take() {
            self.active_location = Some(normalize_location(&active).unwrap_or(active));
        }
        report
    }

    /// Marks every non-empty open box as completed. Returns how many changed.
    pub fn migrate_legacy_completion(&mut self) -> usize {
        let now = Utc::now();
        let mut migrated = 0;
        for record in self.session.boxes.values_mut() {
            if !record.is_empty() && !record.completed {
                record.set_completed(true, now);
                migrated += 1;
            }
        }
        migrated
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tag_position(tag).is_some() {
            return false;
        }
        self.active_tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        match self.tag_position(tag.trim()) {
            Some(position) => {
                self.active_tags.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn clear_tags(&mut self) {
        self.active_tags.clear();
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats::compute(&self.session, now)
    }

    fn tag_position(&self, tag: &str) -> Option<usize> {
        let wanted = tag.to_lowercase();
        self.active_tags
            .iter()
            .position(|existing| existing.to_lowercase() == wanted)
    }

    fn evict_if_idle(&mut self, location: &str) {
        if self.active_location.as_deref() == Some(location) {
            return;
        }
        if self.session.get(location).is_some_and(BoxRecord::is_empty) {
            self.session.boxes.shift_remove(location);
        }
    }
}
