//! Environment-backed configuration
//!
//! Every setting comes from the environment with a stated default; the two
//! API keys are the only required values. [`BotConfig::from_env`] validates
//! everything up front so a misconfigured process dies at startup rather
//! than at first use.

use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::{BotError, Result};

/// Default system prompt when OPENROUTER_SYSTEM_PROMPT is unset
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers clearly and objectively.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub openrouter: OpenRouterConfig,
    pub rag: RagSettings,
    pub history: HistoryConfig,
    pub moderation: ModerationConfig,
}

/// Settings for the OpenRouter chat-completion client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Optional HTTP-Referer attribution header
    pub referer: Option<String>,
    /// Optional X-Title attribution header
    pub title: Option<String>,
}

/// Settings for the retrieval pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    pub enabled: bool,
    /// Key for the embedding API; required only when `enabled`
    pub embedding_api_key: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub qdrant_url: String,
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_threshold: f32,
    pub max_context_tokens: usize,
    pub search_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Conversation turns retained per channel (a turn = user + assistant)
    pub max_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Directory holding moderation_log.json and warns.json
    pub log_dir: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: 60,
            max_tokens: 1024,
            temperature: 0.7,
            referer: None,
            title: None,
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding_api_key: None,
            embedding_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "legal_documents".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            similarity_threshold: 0.7,
            max_context_tokens: 3000,
            search_limit: 10,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_turns: 6 }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            log_dir: ".".to_string(),
        }
    }
}

impl BotConfig {
    /// Load configuration from the environment and validate it.
    ///
    /// Fails with [`BotError::Config`] when a required key is missing or a
    /// value is out of range.
    pub fn from_env() -> Result<Self> {
        let api_key = required_var("OPENROUTER_API_KEY")?;

        let openrouter = OpenRouterConfig {
            api_key,
            base_url: var_or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            model: var_or("OPENROUTER_MODEL", "openai/gpt-4o-mini"),
            system_prompt: var_or("OPENROUTER_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            timeout_secs: parsed_var("OPENROUTER_TIMEOUT_SECS", 60)?,
            max_tokens: parsed_var("OPENROUTER_MAX_TOKENS", 1024)?,
            temperature: parsed_var("OPENROUTER_TEMPERATURE", 0.7)?,
            referer: env::var("OPENROUTER_REFERER").ok(),
            title: env::var("OPENROUTER_TITLE").ok(),
        };

        let rag = RagSettings {
            enabled: parsed_var("RAG_ENABLED", false)?,
            embedding_api_key: env::var("EMBEDDING_API_KEY").ok(),
            embedding_base_url: var_or("EMBEDDING_BASE_URL", "https://api.openai.com/v1"),
            embedding_model: var_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            qdrant_url: var_or("QDRANT_URL", "http://localhost:6334"),
            collection: var_or("QDRANT_COLLECTION", "legal_documents"),
            chunk_size: parsed_var("CHUNK_SIZE", 1000)?,
            chunk_overlap: parsed_var("CHUNK_OVERLAP", 200)?,
            similarity_threshold: parsed_var("SIMILARITY_THRESHOLD", 0.7)?,
            max_context_tokens: parsed_var("MAX_CONTEXT_TOKENS", 3000)?,
            search_limit: parsed_var("SEARCH_LIMIT", 10)?,
        };

        let history = HistoryConfig {
            max_turns: parsed_var("HISTORY_MAX_TURNS", 6)?,
        };

        let moderation = ModerationConfig {
            log_dir: var_or("MODERATION_LOG_DIR", "."),
        };

        let config = Self {
            openrouter,
            rag,
            history,
            moderation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.openrouter.api_key.is_empty() {
            return Err(BotError::Config(
                "OPENROUTER_API_KEY must not be empty".to_string(),
            ));
        }
        if self.openrouter.timeout_secs == 0 {
            return Err(BotError::Config(
                "OPENROUTER_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if self.rag.chunk_size == 0 {
            return Err(BotError::Config("CHUNK_SIZE must be positive".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(BotError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(BotError::Config(format!(
                "SIMILARITY_THRESHOLD must be within [0, 1], got {}",
                self.rag.similarity_threshold
            )));
        }
        if self.rag.enabled && self.rag.embedding_api_key.is_none() {
            return Err(BotError::Config(
                "EMBEDDING_API_KEY is required when RAG_ENABLED=true".to_string(),
            ));
        }
        if self.history.max_turns == 0 {
            return Err(BotError::Config(
                "HISTORY_MAX_TURNS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BotError::Config(format!(
            "required environment variable {} is not set",
            name
        ))),
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            BotError::Config(format!("could not parse {} from value {:?}", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
