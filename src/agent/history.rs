//! In-memory conversation history, bounded per conversation.
//!
//! Histories live only in process memory: a TTL'd cache keyed by the
//! platform conversation id, each entry holding a bounded deque of
//! turns. Idle conversations age out; a restart loses everything,
//! which is the documented contract.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The human in the conversation
    User,
    /// This agent
    Assistant,
}

impl Role {
    /// Wire-level role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message exchange unit in a conversation
#[derive(Debug, Clone)]
pub struct Turn {
    /// Originator of the turn
    pub role: Role,
    /// Message text
    pub text: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
    /// File name of an accompanying attachment, if any
    pub attachment: Option<String>,
}

impl Turn {
    /// Create a turn stamped with the current time
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            attachment: None,
        }
    }

    /// Attach a file name to the turn
    #[must_use]
    pub fn with_attachment(mut self, name: impl Into<String>) -> Self {
        self.attachment = Some(name.into());
        self
    }
}

type History = Arc<Mutex<VecDeque<Turn>>>;

/// Per-conversation bounded history store
#[derive(Clone)]
pub struct ConversationStore {
    conversations: Cache<String, History>,
    max_turns: usize,
}

impl ConversationStore {
    /// Create a store.
    ///
    /// * `max_turns` - turns kept per conversation (oldest evicted first)
    /// * `ttl_secs` - idle lifetime before a conversation is dropped
    /// * `max_capacity` - conversations tracked at once
    #[must_use]
    pub fn new(max_turns: usize, ttl_secs: u64, max_capacity: u64) -> Self {
        let conversations = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(std::time::Duration::from_secs(ttl_secs))
            .build();

        Self {
            conversations,
            max_turns,
        }
    }

    async fn history(&self, conversation_id: &str) -> History {
        self.conversations
            .get_with(conversation_id.to_string(), async {
                Arc::new(Mutex::new(VecDeque::new()))
            })
            .await
    }

    /// Append a turn, evicting the oldest once the bound is reached.
    pub async fn append(&self, conversation_id: &str, turn: Turn) {
        let history = self.history(conversation_id).await;
        let mut turns = history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Copy of the last `n` turns, oldest first.
    pub async fn window(&self, conversation_id: &str, n: usize) -> Vec<Turn> {
        let Some(history) = self.conversations.get(conversation_id).await else {
            return Vec::new();
        };
        let turns = history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Number of turns currently held for a conversation.
    pub async fn len(&self, conversation_id: &str) -> usize {
        match self.conversations.get(conversation_id).await {
            Some(history) => history
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            None => 0,
        }
    }

    /// Empty one conversation's history, leaving every other untouched.
    pub async fn clear(&self, conversation_id: &str) {
        if let Some(history) = self.conversations.get(conversation_id).await {
            history
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clear();
        }
    }

    /// Number of conversations currently tracked (for `/status`).
    #[must_use]
    pub fn tracked_conversations(&self) -> u64 {
        self.conversations.entry_count()
    }

    /// Configured per-conversation bound.
    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::new(4, 60, 100)
    }

    #[tokio::test]
    async fn test_history_bounded_oldest_evicted() {
        let store = store();
        for i in 0..6 {
            store.append("conv", Turn::new(Role::User, format!("m{i}"))).await;
        }

        let turns = store.window("conv", 10).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].text, "m2");
        assert_eq!(turns[3].text, "m5");
    }

    #[tokio::test]
    async fn test_window_returns_trailing_turns() {
        let store = store();
        for i in 0..4 {
            store.append("conv", Turn::new(Role::User, format!("m{i}"))).await;
        }

        let turns = store.window("conv", 2).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "m2");
        assert_eq!(turns[1].text, "m3");
    }

    #[tokio::test]
    async fn test_clear_is_per_conversation() {
        let store = store();
        store.append("a", Turn::new(Role::User, "hello")).await;
        store.append("b", Turn::new(Role::User, "hi")).await;

        store.clear("a").await;

        assert_eq!(store.len("a").await, 0);
        assert_eq!(store.len("b").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = store();
        assert_eq!(store.len("nope").await, 0);
        assert!(store.window("nope", 5).await.is_empty());
        // Clearing an unknown conversation is a no-op
        store.clear("nope").await;
    }

    #[tokio::test]
    async fn test_turn_roles_and_attachment() {
        let turn = Turn::new(Role::Assistant, "reply");
        assert_eq!(turn.role.as_str(), "assistant");
        assert!(turn.attachment.is_none());

        let turn = Turn::new(Role::User, "see file").with_attachment("notes.pdf");
        assert_eq!(turn.attachment.as_deref(), Some("notes.pdf"));
    }
}
