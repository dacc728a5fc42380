use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::normalize::absorb_item;
use crate::models::{BoxRecord, Item, Session};

const ENABLE_LOGS: bool = true;

/// Name given to stored items whose name was lost.
pub const UNNAMED_ITEM: &str = "Unnamed item";

use crate::log_warn;

/// Rebuilds a session from loosely-shaped JSON.
///
/// Returns `None` when the value has no `boxes` object; every other missing
/// or mistyped field is filled in.
pub fn repair_session(value: &Value, now: DateTime<Utc>) -> Option<Session> {
    let root = value.as_object()?;
    let raw_boxes = root.get("boxes")?.as_object()?;

    let started_at = root
        .get("startedAt")
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let mut session = Session::started_at(started_at);
    if let Some(id) = root.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        session.id = id.to_string();
    }

    let mut boxes = IndexMap::with_capacity(raw_boxes.len());
    for (key, raw) in raw_boxes {
        boxes.insert(key.clone(), repair_shape(raw, now));
    }
    session.boxes = boxes;
    Some(session)
}

/// Fills in a possibly partial box record. Entries that are not objects are
/// dropped; nameless items are kept as [`UNNAMED_ITEM`]. Items sharing a name
/// are folded together.
pub fn repair_shape(raw: &Value, now: DateTime<Utc>) -> BoxRecord {
    let Some(fields) = raw.as_object() else {
        log_warn!("box record is not an object; replacing with an empty record");
        return BoxRecord::new();
    };

    let mut items = Vec::new();
    for raw_item in fields.get("items").and_then(Value::as_array).into_iter().flatten() {
        match repair_item(raw_item, now) {
            Some(item) => absorb_item(&mut items, item),
            None => log_warn!("dropping stored item that is not an object: {raw_item}"),
        }
    }

    let completed = fields
        .get("completed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let completed_at = if completed {
        Some(
            fields
                .get("completedAt")
                .and_then(parse_timestamp)
                .unwrap_or(now),
        )
    } else {
        None
    };

    let secondary_location = fields
        .get("secondaryLocation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    BoxRecord {
        items,
        completed,
        completed_at,
        secondary_location,
    }
}

fn repair_item(raw: &Value, now: DateTime<Utc>) -> Option<Item> {
    let fields: &Map<String, Value> = raw.as_object()?;
    let name = match fields.get("name").and_then(Value::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            log_warn!("stored item has no name; keeping it as {UNNAMED_ITEM:?}");
            UNNAMED_ITEM
        }
    };

    let added_at = fields
        .get("addedAt")
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let id = fields
        .get("id")
        .and_then(read_id)
        .unwrap_or_else(|| Item::generate_id(added_at));
    let qty = fields.get("qty").and_then(read_qty).unwrap_or(1);
    let tags = fields
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Item {
        id,
        name: name.to_string(),
        qty,
        added_at,
        is_duplicate: fields
            .get("isDuplicate")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        tags,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Older files stored fractional ids; the integer part is kept.
fn read_id(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|id| id.is_finite() && *id >= 0.0)
            .map(|id| id.trunc() as u64)
    })
}

fn read_qty(value: &Value) -> Option<u32> {
    let qty = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|qty| qty.trunc() as i64))?,
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(u32::try_from(qty.max(1)).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_get_defaults() {
        let now = Utc::now();
        let record = repair_shape(&json!({}), now);
        assert_eq!(record, BoxRecord::new());

        let record = repair_shape(&json!("garbage"), now);
        assert_eq!(record, BoxRecord::new());
    }

    #[test]
    fn items_are_repaired_not_lost() {
        let now = Utc::now();
        let record = repair_shape(
            &json!({
                "items": [
                    { "name": " pen ", "qty": "3" },
                    { "name": "cup", "qty": 0, "id": 1700000000000.25, "tags": ["a", 4, "b"] },
                    { "qty": 2, "id": 7 },
                    { "name": "   " },
                    { "name": 12 },
                    "loose string"
                ]
            }),
            now,
        );

        assert_eq!(record.items.len(), 3);
        assert_eq!(record.items[0].name, "pen");
        assert_eq!(record.items[0].qty, 3);
        assert_eq!(record.items[0].added_at, now);
        assert_eq!(record.items[1].qty, 1);
        assert_eq!(record.items[1].id, 1_700_000_000_000);
        assert_eq!(record.items[1].tags, vec!["a", "b"]);

        // Nameless entries share the placeholder and fold into one line.
        assert_eq!(record.items[2].name, UNNAMED_ITEM);
        assert_eq!(record.items[2].id, 7);
        assert_eq!(record.items[2].qty, 4);
    }

    #[test]
    fn stored_duplicates_are_folded() {
        let now = Utc::now();
        let record = repair_shape(
            &json!({ "items": [{ "name": "Pen", "qty": 1 }, { "name": "pen", "qty": 2 }] }),
            now,
        );
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].name, "Pen");
        assert_eq!(record.items[0].qty, 3);
    }

    #[test]
    fn completion_invariant_is_restored() {
        let now = Utc::now();
        let completed = repair_shape(&json!({ "completed": true }), now);
        assert_eq!(completed.completed_at, Some(now));

        let stale = repair_shape(
            &json!({ "completed": false, "completedAt": "2024-01-01T00:00:00Z" }),
            now,
        );
        assert!(stale.completed_at.is_none());
    }

    #[test]
    fn session_requires_a_box_map() {
        let now = Utc::now();
        assert!(repair_session(&json!({ "id": "x" }), now).is_none());
        assert!(repair_session(&json!({ "boxes": [] }), now).is_none());
        assert!(repair_session(&json!([]), now).is_none());

        let session = repair_session(
            &json!({
                "id": null,
                "startedAt": "2024-05-01T08:30:00Z",
                "boxes": { "BOX002": { "items": [] }, "BOX001": {} }
            }),
            now,
        )
        .unwrap();
        assert!(session.id.starts_with("session-"));
        assert_eq!(session.started_at.to_rfc3339(), "2024-05-01T08:30:00+00:00");
        assert_eq!(session.boxes.keys().collect::<Vec<_>>(), vec!["BOX002", "BOX001"]);
    }
}
