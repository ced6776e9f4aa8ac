//! Token-bounded context assembly
//!
//! Turns a similarity-search result list into the context block injected
//! into the chat prompt. Token counting uses the 4-chars-per-token
//! heuristic throughout; swapping in a model tokenizer would only tighten
//! truncation, never loosen it.

use serde::{Deserialize, Serialize};

use crate::rag::store::ScoredChunk;

/// Header prefixed to every non-empty context block
const CONTEXT_HEADER: &str = "Relevant context from legal documents:";
/// Separator between concatenated chunks
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Heuristic token estimate: 1 token ≈ 4 characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Assembled retrieval context with provenance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Formatted context text; empty when nothing cleared the threshold
    pub text: String,
    /// Source filenames of the included chunks, highest similarity first
    pub sources: Vec<String>,
    /// Similarity scores aligned with `sources`
    pub scores: Vec<f32>,
    pub chunk_count: usize,
    pub estimated_tokens: usize,
}

impl RetrievedContext {
    /// An empty context means "answer without retrieval augmentation".
    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

/// Assembles search results into a budgeted context block
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_tokens: usize,
}

impl ContextBuilder {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Greedily concatenate chunks, highest similarity first, stopping
    /// before the chunk that would push the total past the budget. An
    /// empty result list yields an empty context, never an error.
    pub fn assemble(&self, results: &[ScoredChunk]) -> RetrievedContext {
        self.assemble_within(results, self.max_tokens)
    }

    /// Same as [`assemble`](Self::assemble) with a caller-supplied budget.
    pub fn assemble_within(&self, results: &[ScoredChunk], max_tokens: usize) -> RetrievedContext {
        let mut ordered: Vec<&ScoredChunk> = results.iter().collect();
        ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut parts = Vec::new();
        let mut sources = Vec::new();
        let mut scores = Vec::new();
        let mut total_tokens = 0usize;

        for chunk in ordered {
            let chunk_tokens = estimate_tokens(&chunk.text);
            if total_tokens + chunk_tokens > max_tokens && !parts.is_empty() {
                break;
            }
            if chunk_tokens > max_tokens && parts.is_empty() {
                // Even the best chunk alone blows the budget; return empty
                // rather than an over-budget context.
                break;
            }
            parts.push(chunk.text.as_str());
            sources.push(chunk.source.clone());
            scores.push(chunk.score);
            total_tokens += chunk_tokens;
        }

        if parts.is_empty() {
            return RetrievedContext::default();
        }

        let text = format!(
            "{}\n\n{}",
            CONTEXT_HEADER,
            parts.join(CHUNK_SEPARATOR)
        );

        RetrievedContext {
            text,
            chunk_count: sources.len(),
            sources,
            scores,
            estimated_tokens: total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32, source: &str) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            score,
            source: source.to_string(),
            content_hash: "hash".to_string(),
            chunk_index: 0,
        }
    }

    #[test]
    fn test_empty_results_yield_empty_context() {
        let builder = ContextBuilder::new(3000);
        let context = builder.assemble(&[]);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
        assert_eq!(context.estimated_tokens, 0);
    }

    #[test]
    fn test_single_chunk_formatted_with_header() {
        let builder = ContextBuilder::new(3000);
        let context = builder.assemble(&[chunk("Article 1 applies.", 0.9, "law.pdf")]);
        assert!(context.text.starts_with(CONTEXT_HEADER));
        assert!(context.text.contains("Article 1 applies."));
        assert_eq!(context.sources, vec!["law.pdf".to_string()]);
        assert_eq!(context.chunk_count, 1);
    }

    #[test]
    fn test_highest_similarity_first() {
        let builder = ContextBuilder::new(3000);
        let context = builder.assemble(&[
            chunk("lower", 0.71, "b.pdf"),
            chunk("higher", 0.95, "a.pdf"),
        ]);
        assert_eq!(context.sources, vec!["a.pdf".to_string(), "b.pdf".to_string()]);
        assert!(context.scores[0] > context.scores[1]);
        let higher_at = context.text.find("higher").unwrap();
        let lower_at = context.text.find("lower").unwrap();
        assert!(higher_at < lower_at);
    }

    #[test]
    fn test_budget_respected() {
        // 40-char chunks ≈ 10 tokens each; budget of 15 fits exactly one.
        let builder = ContextBuilder::new(15);
        let context = builder.assemble(&[
            chunk(&"a".repeat(40), 0.9, "a.pdf"),
            chunk(&"b".repeat(40), 0.8, "b.pdf"),
        ]);
        assert_eq!(context.chunk_count, 1);
        assert!(context.estimated_tokens <= 15);
    }

    #[test]
    fn test_never_exceeds_budget_even_for_first_chunk() {
        let builder = ContextBuilder::new(5);
        let context = builder.assemble(&[chunk(&"x".repeat(400), 0.99, "big.pdf")]);
        assert!(context.is_empty());
    }

    #[test]
    fn test_caller_budget_overrides_default() {
        let builder = ContextBuilder::new(1);
        let results = vec![chunk(&"y".repeat(40), 0.9, "a.pdf")];
        assert!(builder.assemble(&results).is_empty());
        assert_eq!(builder.assemble_within(&results, 100).chunk_count, 1);
    }

    #[test]
    fn test_estimate_tokens_heuristic() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}
