use indexmap::IndexMap;

use crate::{
    location::{normalize_location, normalize_shelf},
    models::{session::name_key, BoxRecord, Item},
};

/// What a normalization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Keys rewritten to a different canonical form.
    pub rekeyed: usize,
    /// Records folded into an earlier record with the same canonical key.
    pub merged: usize,
}

impl NormalizeReport {
    pub fn is_noop(&self) -> bool {
        self.rekeyed == 0 && self.merged == 0
    }
}

/// Re-keys `boxes` through the location normalizer. Colliding records merge
/// into whichever was seen first, which also keeps its position.
pub fn normalize_boxes(
    boxes: IndexMap<String, BoxRecord>,
) -> (IndexMap<String, BoxRecord>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut normalized: IndexMap<String, BoxRecord> = IndexMap::with_capacity(boxes.len());

    for (key, mut record) in boxes {
        let canonical = normalize_location(&key).unwrap_or_else(|| key.clone());
        if canonical != key {
            report.rekeyed += 1;
        }

        record.secondary_location = record
            .secondary_location
            .as_deref()
            .and_then(normalize_shelf);

        match normalized.get_mut(&canonical) {
            Some(existing) => {
                merge_records(existing, record);
                report.merged += 1;
            }
            None => {
                normalized.insert(canonical, record);
            }
        }
    }

    (normalized, report)
}

/// Folds `incoming` into `existing`: items appended in order, completion
/// OR-ed keeping the earliest timestamp, first secondary location wins.
pub fn merge_records(existing: &mut BoxRecord, incoming: BoxRecord) {
    for item in incoming.items {
        absorb_item(&mut existing.items, item);
    }

    let completed = existing.completed || incoming.completed;
    existing.completed_at = if completed {
        match (existing.completed_at, incoming.completed_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    } else {
        None
    };
    existing.completed = completed;

    if existing.secondary_location.is_none() {
        existing.secondary_location = incoming.secondary_location;
    }
}

/// Adds `item`, or folds it into the existing item with the same name.
pub(super) fn absorb_item(items: &mut Vec<Item>, item: Item) {
    let wanted = name_key(&item.name);
    match items.iter_mut().find(|existing| name_key(&existing.name) == wanted) {
        Some(existing) => {
            existing.qty = existing.qty.saturating_add(item.qty);
            existing.added_at = existing.added_at.max(item.added_at);
            for tag in item.tags {
                if !existing.tags.contains(&tag) {
                    existing.tags.push(tag);
                }
            }
        }
        None => items.push(item),
    }
}
