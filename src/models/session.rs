use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One working audit session: every box and shelf the operator has touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    /// Keyed by canonical location. Insertion order is preserved; the last
    /// key is the most recently opened location.
    pub boxes: IndexMap<String, BoxRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("session-{}", started_at.timestamp_millis()),
            started_at,
            boxes: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&BoxRecord> {
        self.boxes.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut BoxRecord> {
        self.boxes.get_mut(key)
    }

    pub fn most_recent_key(&self) -> Option<&str> {
        self.boxes.keys().last().map(String::as_str)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoxRecord {
    /// Chronological add order; the UI shows them newest first.
    pub items: Vec<Item>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub secondary_location: Option<String>,
}

impl BoxRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items_newest_first(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().rev()
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        let needle = name_key(name);
        self.items.iter().position(|item| name_key(&item.name) == needle)
    }

    pub fn position_by_id(&self, item_id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    /// Sets `completed` and keeps `completed_at` in step with it.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(now);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub qty: u32,
    pub added_at: DateTime<Utc>,
    /// Kept for file compatibility. Nothing sets it; same-name adds merge instead.
    pub is_duplicate: bool,
    pub tags: Vec<String>,
}

impl Item {
    pub fn new(name: String, qty: u32, tags: Vec<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            id: Item::generate_id(added_at),
            name,
            qty: qty.max(1),
            added_at,
            is_duplicate: false,
            tags,
        }
    }

    /// Millisecond timestamp scaled by 1000 with a random tie-break in the low digits.
    pub fn generate_id(at: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let jitter: u64 = rand::thread_rng().gen_range(0..1000);
        millis.saturating_mul(1000).saturating_add(jitter)
    }
}

/// Comparison key for the one-item-per-name rule.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
