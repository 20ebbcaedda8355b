use crate::core::{BagMessage, VirtualTime};

/// Messages of one topic in stamp order, with a read cursor
#[derive(Debug, Clone, Default)]
pub struct TopicBuffer {
    messages: Vec<BagMessage>,
    cursor: usize,
}

impl TopicBuffer {
    /// Build a buffer, stable-sorting by stamp so equal stamps keep their
    /// ingestion order
    pub fn new(mut messages: Vec<BagMessage>) -> Self {
        messages.sort_by_key(|m| m.stamp());
        Self { messages, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn first(&self) -> Option<&BagMessage> {
        self.messages.first()
    }

    /// Index of the next message not yet delivered
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.messages.len());
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Index of the first message stamped at or after `time`
    pub fn index_at_or_after(&self, time: VirtualTime) -> usize {
        self.messages.partition_point(|m| m.stamp() < time)
    }

    /// Take every undelivered message stamped strictly before `until`,
    /// moving the cursor past them
    pub fn take_due(&mut self, until: VirtualTime) -> &[BagMessage] {
        let start = self.cursor;
        let end = start + self.messages[start..].partition_point(|m| m.stamp() < until);
        self.cursor = end;
        &self.messages[start..end]
    }
}
