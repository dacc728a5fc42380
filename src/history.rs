use crate::models::Session;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Bounded undo/redo stack of whole-session snapshots.
///
/// Every entry is an owned clone, so neither the live session nor a restored
/// copy can reach back into the stack.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Session>,
    index: usize,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            max_entries: max_entries.max(1),
        }
    }

    pub fn record(&mut self, session: &Session) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(session.clone());
        self.index = self.entries.len() - 1;

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
            self.index -= 1;
        }
    }

    pub fn undo(&mut self) -> Option<Session> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).cloned()
    }

    pub fn redo(&mut self) -> Option<Session> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
