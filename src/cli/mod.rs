//! Terminal front-end
//!
//! Stands in for the Discord shell: wires the chat client, the history
//! store, and the retrieval pipeline together and renders their results.
//! Chat failures are per-message notices, never process exits; ingestion
//! runs as its own task so a long embed loop cannot wedge the input loop.

pub mod args;

pub use args::{Args, Commands};

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{build_messages, with_context, ChatMessage, HistoryStore, OpenRouterClient};
use crate::config::BotConfig;
use crate::errors::BotError;
use crate::rag::context::RetrievedContext;
use crate::rag::{Chunker, EmbeddingClient, IngestStatus, RagOptions, RagPipeline, VectorStore};

/// Channel id used for the single terminal conversation
const TERMINAL_CHANNEL: u64 = 0;

pub async fn run(args: Args, config: BotConfig) -> Result<()> {
    match args.command {
        Commands::Chat { no_rag } => run_chat(&config, no_rag).await,
        Commands::Ask { query, no_rag } => run_ask(&config, &query, no_rag).await,
        Commands::Ingest { file } => run_ingest(&config, file).await,
        Commands::Delete { hash } => run_delete(&config, &hash).await,
        Commands::Info => run_info(&config).await,
        Commands::Models => run_models(&config).await,
    }
}

/// Build the retrieval pipeline, or None when RAG is disabled.
async fn build_pipeline(config: &BotConfig, no_rag: bool) -> Result<Option<Arc<RagPipeline>>> {
    if no_rag || !config.rag.enabled {
        return Ok(None);
    }

    let rag = &config.rag;
    let embedder = EmbeddingClient::new(
        &rag.embedding_base_url,
        rag.embedding_api_key.as_deref().unwrap_or_default(),
        &rag.embedding_model,
        Duration::from_secs(config.openrouter.timeout_secs),
    )?;
    let store = VectorStore::connect(&rag.qdrant_url, &rag.collection).await?;
    let chunker = Chunker::new(rag.chunk_size, rag.chunk_overlap)?;
    let options = RagOptions {
        similarity_threshold: rag.similarity_threshold,
        search_limit: rag.search_limit,
        max_context_tokens: rag.max_context_tokens,
    };

    Ok(Some(Arc::new(RagPipeline::new(
        store,
        Arc::new(embedder),
        chunker,
        options,
    ))))
}

/// Pipeline builder for commands that require RAG to be configured.
async fn require_pipeline(config: &BotConfig) -> Result<Arc<RagPipeline>> {
    build_pipeline(config, false)
        .await?
        .ok_or_else(|| anyhow::anyhow!("RAG is disabled; set RAG_ENABLED=true and EMBEDDING_API_KEY"))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Retrieve context for a query, degrading to an empty context (with a
/// visible notice) when retrieval fails, so the chat keeps working.
async fn retrieve_or_empty(pipeline: &RagPipeline, query: &str) -> RetrievedContext {
    match pipeline.retrieve_context(query, None).await {
        Ok(context) => context,
        Err(e) => {
            eprintln!(
                "{}: retrieval failed, answering without context: {}",
                "Warning".yellow(),
                e
            );
            RetrievedContext::default()
        }
    }
}

fn print_chat_error(e: &BotError) {
    if e.is_retryable() {
        eprintln!("{}: {} (worth retrying)", "Temporary failure".yellow(), e);
    } else {
        eprintln!("{}: {}", "Error".red(), e);
    }
}

async fn run_chat(config: &BotConfig, no_rag: bool) -> Result<()> {
    let client = OpenRouterClient::new(&config.openrouter)?;
    let pipeline = build_pipeline(config, no_rag).await?;
    let history_store = HistoryStore::new(config.history.max_turns);
    let history = history_store.channel(TERMINAL_CHANNEL).await;

    println!("lexbot (model {})", config.openrouter.model.cyan());
    if pipeline.is_some() {
        println!("retrieval: {}", "enabled".green());
    } else {
        println!("retrieval: {}", "disabled".yellow());
    }
    println!("Type /clear to reset the conversation, /exit or Ctrl-D to quit.\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                match input {
                    "/exit" | "/quit" => break,
                    "/clear" => {
                        history.clear().await;
                        println!("conversation cleared");
                        continue;
                    }
                    _ => {}
                }

                let context = match &pipeline {
                    Some(p) => retrieve_or_empty(p, input).await,
                    None => RetrievedContext::default(),
                };

                let messages = with_context(
                    build_messages(
                        Some(&config.openrouter.system_prompt),
                        &history.snapshot().await,
                        input,
                    ),
                    &context,
                );

                let pb = spinner("Thinking...");
                let result = client.complete(&messages).await;
                pb.finish_and_clear();

                match result {
                    Ok(reply) => {
                        if !context.is_empty() {
                            println!(
                                "{}",
                                format!("[{} context chunks from: {}]", context.chunk_count, context.sources.join(", "))
                                    .dimmed()
                            );
                        }
                        println!("{} {}\n", "bot>".cyan(), reply);
                        history
                            .push_exchange(ChatMessage::user(input), ChatMessage::assistant(reply))
                            .await;
                    }
                    Err(e) => print_chat_error(&e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use /exit to quit");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn run_ask(config: &BotConfig, query: &str, no_rag: bool) -> Result<()> {
    let client = OpenRouterClient::new(&config.openrouter)?;
    let pipeline = build_pipeline(config, no_rag).await?;

    let context = match &pipeline {
        Some(p) => retrieve_or_empty(p, query).await,
        None => RetrievedContext::default(),
    };

    let messages = with_context(
        build_messages(Some(&config.openrouter.system_prompt), &[], query),
        &context,
    );

    let pb = spinner("Thinking...");
    let result = client.complete(&messages).await;
    pb.finish_and_clear();

    match result {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            print_chat_error(&e);
            std::process::exit(1);
        }
    }
}

async fn run_ingest(config: &BotConfig, file: PathBuf) -> Result<()> {
    let pipeline = require_pipeline(config).await?;

    let pb = spinner(&format!("Processing {}...", file.display()));
    // Ingestion is the long operation (one embedding call per chunk); run
    // it as its own task, the way a message handler would.
    let handle = tokio::spawn(async move { pipeline.add_document(&file).await });
    let result = handle.await?;
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            match report.status {
                IngestStatus::Stored => {
                    println!("{} {}", "Stored".green(), report.filename);
                    println!("  chunks:       {}", report.chunk_count);
                    println!("  content hash: {}", report.content_hash);
                }
                IngestStatus::Duplicate => {
                    println!(
                        "{}: identical content already stored ({} chunks, hash {})",
                        "Duplicate".yellow(),
                        report.chunk_count,
                        &report.content_hash[..16.min(report.content_hash.len())]
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            if e.is_retryable() {
                eprintln!("{}: {} (no partial document was kept)", "Temporary failure".yellow(), e);
            } else {
                eprintln!("{}: {}", "Ingestion failed".red(), e);
            }
            std::process::exit(1);
        }
    }
}

async fn run_delete(config: &BotConfig, hash: &str) -> Result<()> {
    let pipeline = require_pipeline(config).await?;
    pipeline.delete_document(hash).await?;
    println!("Deleted all chunks for {}", hash);
    Ok(())
}

async fn run_info(config: &BotConfig) -> Result<()> {
    let pipeline = require_pipeline(config).await?;
    let info = pipeline.info().await?;
    println!("collection: {}", info.collection);
    println!("documents:  {}", info.document_count);
    println!("chunks:     {}", info.chunk_count);
    Ok(())
}

async fn run_models(config: &BotConfig) -> Result<()> {
    let client = OpenRouterClient::new(&config.openrouter)?;
    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models reported.");
    } else {
        for model in models {
            println!("  {}", model);
        }
    }
    Ok(())
}