// Chat layer: OpenRouter completion client, per-channel history, and the
// message-assembly helpers the bot shell calls before and after each
// completion.

pub mod client;
pub mod history;

pub use client::OpenRouterClient;
pub use history::{build_messages, ChannelHistory, HistoryStore};

use serde::{Deserialize, Serialize};

use crate::rag::context::RetrievedContext;

/// Discord caps outbound messages at 2000 characters.
pub const REPLY_CHAR_LIMIT: usize = 2000;

/// Message role on the completion wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role/content pair in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Inject a retrieval context into an outbound message list.
///
/// A non-empty context becomes one additional system-role message placed
/// immediately ahead of the final user turn; everything else keeps its
/// order. An empty context returns the messages untouched, which is the
/// "answer without augmentation" path.
pub fn with_context(mut messages: Vec<ChatMessage>, context: &RetrievedContext) -> Vec<ChatMessage> {
    if context.is_empty() {
        return messages;
    }
    let insert_at = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(messages.len());
    messages.insert(insert_at, ChatMessage::system(context.text.clone()));
    messages
}

/// Split a reply into pieces that fit the platform message-length cap,
/// preferring newline and then space boundaries over mid-word cuts.
pub fn split_reply(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + limit).min(chars.len());
        if end < chars.len() {
            let window = &chars[start..end];
            let split_at = window
                .iter()
                .rposition(|&c| c == '\n')
                .or_else(|| window.iter().rposition(|&c| c == ' '));
            if let Some(pos) = split_at {
                if pos > 0 {
                    end = start + pos + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        start = end;
    }

    chunks
}
