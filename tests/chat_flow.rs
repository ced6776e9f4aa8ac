//! Integration tests for the chat-side flow: history, message assembly,
//! context injection, and reply splitting working together.

use lexbot::chat::{
    build_messages, split_reply, with_context, ChannelHistory, ChatMessage, HistoryStore, Role,
    REPLY_CHAR_LIMIT,
};
use lexbot::rag::context::RetrievedContext;

fn context_block(text: &str) -> RetrievedContext {
    RetrievedContext {
        text: text.to_string(),
        sources: vec!["statute.pdf".to_string()],
        scores: vec![0.88],
        chunk_count: 1,
        estimated_tokens: 25,
    }
}

#[tokio::test]
async fn full_turn_assembles_in_documented_order() {
    let store = HistoryStore::new(6);
    let history = store.channel(1001).await;

    history
        .push_exchange(
            ChatMessage::user("what is a lien?"),
            ChatMessage::assistant("a legal claim against property"),
        )
        .await;

    let messages = with_context(
        build_messages(
            Some("You are a legal assistant."),
            &history.snapshot().await,
            "and how is it released?",
        ),
        &context_block("Relevant context from legal documents:\n\nLien release requires..."),
    );

    // system prompt, prior turn, injected context, current user turn
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "what is a lien?");
    assert_eq!(messages[2].content, "a legal claim against property");
    assert_eq!(messages[3].role, Role::System);
    assert!(messages[3].content.contains("Lien release"));
    assert_eq!(messages[4].role, Role::User);
    assert_eq!(messages[4].content, "and how is it released?");
}

#[tokio::test]
async fn empty_context_means_plain_completion() {
    let store = HistoryStore::new(6);
    let history = store.channel(1).await;

    let messages = with_context(
        build_messages(Some("prompt"), &history.snapshot().await, "hello"),
        &RetrievedContext::default(),
    );

    assert_eq!(messages.len(), 2);
    assert!(messages.iter().filter(|m| m.role == Role::System).count() == 1);
}

#[tokio::test]
async fn history_bound_holds_across_many_turns() {
    let history = ChannelHistory::new(3); // 6 messages
    for i in 0..50 {
        history
            .push_exchange(
                ChatMessage::user(format!("q{}", i)),
                ChatMessage::assistant(format!("a{}", i)),
            )
            .await;
    }
    let snapshot = history.snapshot().await;
    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot[0].content, "q47");
    assert_eq!(snapshot[5].content, "a49");
}

#[test]
fn long_reply_splits_within_discord_limit() {
    let paragraph = "The indemnification clause survives termination. ".repeat(120);
    let chunks = split_reply(&paragraph, REPLY_CHAR_LIMIT);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= REPLY_CHAR_LIMIT);
        // Boundary splitting keeps words whole.
        assert!(!chunk.starts_with(' '));
        assert!(!chunk.ends_with(' '));
    }
    let rejoined = chunks.join(" ");
    assert_eq!(
        rejoined.split_whitespace().count(),
        paragraph.split_whitespace().count()
    );
}
