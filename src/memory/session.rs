use std::collections::VecDeque;

use super::{MemoryEntry, MemoryType};
use crate::conversation::{ConversationEntry, Message};

const SESSION_SCORE: f32 = 0.8;

/// In-process rolling buffer of the current conversation.
#[derive(Debug)]
pub struct SessionMemory {
    entries: VecDeque<ConversationEntry>,
    capacity: usize,
    search_window: usize,
}

impl SessionMemory {
    pub fn new(capacity: usize, search_window: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            search_window,
        }
    }

    /// Append, dropping the oldest entry when full.
    pub fn push(&mut self, entry: ConversationEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Case-insensitive substring search over the most recent entries,
    /// oldest first.
    pub fn search(&self, query: &str, user_id: &str, limit: usize) -> Vec<MemoryEntry> {
        let query = query.to_lowercase();
        let skip = self.entries.len().saturating_sub(self.search_window);

        self.entries
            .iter()
            .skip(skip)
            .filter(|e| {
                e.user_message.to_lowercase().contains(&query)
                    || e.assistant_response.to_lowercase().contains(&query)
            })
            .take(limit)
            .map(|e| MemoryEntry {
                id: format!("session-{}", e.timestamp.timestamp_micros()),
                content: format_exchange(e),
                memory_type: MemoryType::Conversation,
                user_id: user_id.to_string(),
                score: Some(SESSION_SCORE),
                created_at: e.timestamp,
                metadata: e.metadata.clone(),
            })
            .collect()
    }

    /// Last `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ConversationEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn messages_for_api(&self) -> Vec<Message> {
        self.entries.iter().flat_map(|e| e.to_messages()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How an exchange is written into memory.
pub fn format_exchange(entry: &ConversationEntry) -> String {
    format!("사용자: {}\nAI: {}", entry.user_message, entry.assistant_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn filled(capacity: usize, window: usize, n: usize) -> SessionMemory {
        let mut session = SessionMemory::new(capacity, window);
        for i in 0..n {
            session.push(ConversationEntry::new(format!("question {}", i), format!("Answer {}", i)));
        }
        session
    }

    #[test]
    fn capacity_drops_oldest() {
        let session = filled(3, 20, 5);
        assert_eq!(session.len(), 3);
        let recent = session.recent(10);
        assert_eq!(recent[0].user_message, "question 2");
        assert_eq!(recent[2].user_message, "question 4");
    }

    #[test]
    fn search_only_sees_the_window() {
        let session = filled(100, 5, 30);
        let hits = session.search("question 1", "u", 10);
        // question 1, 10..19 are outside the last five
        assert!(hits.is_empty());

        let hits = session.search("ANSWER", "u", 10);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].content, "사용자: question 25\nAI: Answer 25");
        assert_eq!(hits[0].score, Some(0.8));
        assert_eq!(hits[0].memory_type, MemoryType::Conversation);
    }

    #[test]
    fn search_keeps_entry_metadata() {
        let mut session = SessionMemory::new(10, 10);
        let metadata = HashMap::from([
            ("session_id".to_string(), json!("s-1")),
            ("personality".to_string(), json!("playful")),
        ]);
        session.push(ConversationEntry::new("피자 좋아해", "저도요!").with_metadata(metadata));

        let hits = session.search("피자", "u", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["session_id"], "s-1");
        assert_eq!(hits[0].metadata["personality"], "playful");
    }

    #[test]
    fn search_respects_limit() {
        let session = filled(100, 20, 10);
        assert_eq!(session.search("answer", "u", 2).len(), 2);
    }

    #[test]
    fn messages_and_clear() {
        let mut session = filled(10, 10, 2);
        assert_eq!(session.messages_for_api().len(), 4);
        session.clear();
        assert!(session.is_empty());
        assert!(session.recent(5).is_empty());
    }
}
