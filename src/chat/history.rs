//! Bounded per-channel conversation history
//!
//! Each channel keeps a FIFO deque capped at `2 × max_turns` messages
//! (a turn is a user/assistant pair). Appends go through a per-channel
//! async mutex so concurrent handlers in the same channel serialize, and
//! the user/assistant pair lands atomically: history never holds a
//! question without its answer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::chat::ChatMessage;

/// History for one channel
#[derive(Debug)]
pub struct ChannelHistory {
    turns: Mutex<VecDeque<ChatMessage>>,
    max_messages: usize,
}

impl ChannelHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            max_messages: max_turns * 2,
        }
    }

    /// Append a user/assistant exchange atomically, evicting the oldest
    /// messages once the bound is reached.
    pub async fn push_exchange(&self, user: ChatMessage, assistant: ChatMessage) {
        let mut turns = self.turns.lock().await;
        turns.push_back(user);
        turns.push_back(assistant);
        while turns.len() > self.max_messages {
            turns.pop_front();
        }
    }

    /// Ordered copy of the channel's messages.
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.turns.lock().await.clear();
    }
}

/// Conversation histories keyed by channel id
pub struct HistoryStore {
    channels: Mutex<HashMap<u64, Arc<ChannelHistory>>>,
    max_turns: usize,
}

impl HistoryStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Handle for one channel, created on first use. The handle is shared,
    /// so every caller for a channel serializes on the same inner lock.
    pub async fn channel(&self, channel_id: u64) -> Arc<ChannelHistory> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel_id)
            .or_insert_with(|| Arc::new(ChannelHistory::new(self.max_turns)))
            .clone()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

/// Assemble the outbound message list: system prompt (when set), then the
/// channel history in order, then the current user turn. Retrieval context
/// is injected afterwards by [`with_context`](crate::chat::with_context).
pub fn build_messages(
    system_prompt: Option<&str>,
    history: &[ChatMessage],
    user_content: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(prompt) = system_prompt {
        if !prompt.is_empty() {
            messages.push(ChatMessage::system(prompt));
        }
    }
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_content));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    #[tokio::test]
    async fn test_exchange_appends_in_order() {
        let history = ChannelHistory::new(6);
        history
            .push_exchange(ChatMessage::user("q1"), ChatMessage::assistant("a1"))
            .await;
        history
            .push_exchange(ChatMessage::user("q2"), ChatMessage::assistant("a2"))
            .await;

        let snapshot = history.snapshot().await;
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].content, "q1");
        assert_eq!(snapshot[3].content, "a2");
    }

    #[tokio::test]
    async fn test_bound_evicts_oldest_first() {
        let history = ChannelHistory::new(2); // 4 messages max
        for i in 0..5 {
            history
                .push_exchange(
                    ChatMessage::user(format!("q{}", i)),
                    ChatMessage::assistant(format!("a{}", i)),
                )
                .await;
        }

        let snapshot = history.snapshot().await;
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].content, "q3");
        assert_eq!(snapshot[3].content, "a4");
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let store = HistoryStore::new(6);
        let a = store.channel(1).await;
        let b = store.channel(2).await;

        a.push_exchange(ChatMessage::user("only in a"), ChatMessage::assistant("ok"))
            .await;

        assert_eq!(a.len().await, 2);
        assert!(b.is_empty().await);
        assert_eq!(store.channel_count().await, 2);
    }

    #[tokio::test]
    async fn test_channel_handle_is_shared() {
        let store = HistoryStore::new(6);
        let first = store.channel(7).await;
        first
            .push_exchange(ChatMessage::user("q"), ChatMessage::assistant("a"))
            .await;

        let second = store.channel(7).await;
        assert_eq!(second.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_serialize() {
        let store = Arc::new(HistoryStore::new(50));
        let mut handles = Vec::new();
        for i in 0..20u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let channel = store.channel(9).await;
                channel
                    .push_exchange(
                        ChatMessage::user(format!("q{}", i)),
                        ChatMessage::assistant(format!("a{}", i)),
                    )
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store.channel(9).await.snapshot().await;
        assert_eq!(snapshot.len(), 40);
        // Pairs stay adjacent regardless of interleaving.
        for pair in snapshot.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }

    #[test]
    fn test_build_messages_order() {
        let history = vec![
            ChatMessage::user("old q"),
            ChatMessage::assistant("old a"),
        ];
        let messages = build_messages(Some("be helpful"), &history, "new q");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "old q");
        assert_eq!(messages[3].content, "new q");
        assert_eq!(messages[3].role, Role::User);
    }

    #[test]
    fn test_build_messages_without_system_prompt() {
        let messages = build_messages(None, &[], "q");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);

        let messages = build_messages(Some(""), &[], "q");
        assert_eq!(messages.len(), 1);
    }
}
