use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    location::{location_kind, LocationKind},
    models::Session,
};

/// Figures the dashboard shows, derived from the session on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub box_count: usize,
    pub shelf_count: usize,
    pub completed_count: usize,
    /// Distinct item entries.
    pub line_count: usize,
    /// Sum of quantities.
    pub item_count: u64,
    pub elapsed_minutes: i64,
    pub items_per_hour: f64,
}

impl SessionStats {
    pub fn compute(session: &Session, now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            box_count: 0,
            shelf_count: 0,
            completed_count: 0,
            line_count: 0,
            item_count: 0,
            elapsed_minutes: (now - session.started_at).num_minutes().max(0),
            items_per_hour: 0.0,
        };

        for (key, record) in &session.boxes {
            match location_kind(key) {
                LocationKind::Shelf => stats.shelf_count += 1,
                LocationKind::Box | LocationKind::Other => stats.box_count += 1,
            }
            if record.completed {
                stats.completed_count += 1;
            }
            stats.line_count += record.items.len();
            stats.item_count += record.items.iter().map(|item| u64::from(item.qty)).sum::<u64>();
        }

        // Clamp to a minute so the first entries don't report absurd rates.
        let hours = stats.elapsed_minutes.max(1) as f64 / 60.0;
        stats.items_per_hour = stats.item_count as f64 / hours;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoxRecord, Item};
    use chrono::Duration;

    #[test]
    fn counts_and_rate() {
        let start = Utc::now() - Duration::minutes(30);
        let mut session = Session::started_at(start);

        let mut first = BoxRecord::new();
        first.items.push(Item::new("pen".into(), 3, Vec::new(), start));
        first.items.push(Item::new("cup".into(), 1, Vec::new(), start));
        first.set_completed(true, start);
        session.boxes.insert("BOX001".into(), first);
        session.boxes.insert("SHELF 2A".into(), BoxRecord::new());

        let stats = SessionStats::compute(&session, start + Duration::minutes(30));
        assert_eq!(stats.box_count, 1);
        assert_eq!(stats.shelf_count, 1);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.line_count, 2);
        assert_eq!(stats.item_count, 4);
        assert_eq!(stats.elapsed_minutes, 30);
        assert!((stats.items_per_hour - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_session_has_zero_rate() {
        let session = Session::new();
        let stats = SessionStats::compute(&session, session.started_at);
        assert_eq!(stats.item_count, 0);
        assert_eq!(stats.items_per_hour, 0.0);
    }
}
