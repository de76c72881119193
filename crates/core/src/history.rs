use std::collections::VecDeque;

use crate::types::ChatMessage;

/// Conversation log that drops its oldest message once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    buf: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);

        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        if self.buf.len() >= self.capacity {
            let _ = self.buf.pop_front();
        }
        self.buf.push_back(message);
    }

    /// The last `n` messages, oldest first.
    pub fn trailing(&self, n: usize) -> Vec<ChatMessage> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.buf.iter()
    }

    pub fn first(&self) -> Option<&ChatMessage> {
        self.buf.front()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
