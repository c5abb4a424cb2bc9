use consult_dm::DisplayMessage;
use std::collections::HashSet;

/// Displayed messages of one conversation, ascending by `(created_at, id)`,
/// holding at most one entry per message id.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<DisplayMessage>,
    seen: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Insert in order. Returns false if the id is already present.
    pub fn insert(&mut self, message: DisplayMessage) -> bool {
        if !self.seen.insert(message.id.clone()) {
            return false;
        }
        let key = (message.created_at, message.id.as_str());
        let position = self.entries.partition_point(|m| (m.created_at, m.id.as_str()) <= key);
        self.entries.insert(position, message);
        true
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
