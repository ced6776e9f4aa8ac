//! Command-line argument parsing
//!
//! clap-based CLI with subcommands for the chat loop and the document
//! management operations an admin would otherwise run through Discord
//! commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lexbot - OpenRouter chatbot core with legal-document retrieval
#[derive(Parser, Debug)]
#[command(name = "lexbot")]
#[command(version)]
#[command(about = "OpenRouter chat with qdrant-backed document retrieval", long_about = None)]
pub struct Args {
    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Disable retrieval augmentation for this session
        #[arg(long)]
        no_rag: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question
        query: String,

        /// Disable retrieval augmentation
        #[arg(long)]
        no_rag: bool,
    },

    /// Ingest a document into the vector store
    Ingest {
        /// Path to a PDF, DOCX, DOC, Markdown, or TXT file
        file: PathBuf,
    },

    /// Delete a document and all of its chunks by content hash
    Delete {
        /// Content hash printed at ingest time
        hash: String,
    },

    /// Show vector store diagnostics
    Info,

    /// List models available on OpenRouter
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let args = Args::try_parse_from(["lexbot", "ask", "what is clause 4?", "--no-rag"]).unwrap();
        match args.command {
            Commands::Ask { query, no_rag } => {
                assert_eq!(query, "what is clause 4?");
                assert!(no_rag);
            }
            _ => panic!("expected ask subcommand"),
        }
    }

    #[test]
    fn test_parse_ingest() {
        let args = Args::try_parse_from(["lexbot", "ingest", "contract.pdf"]).unwrap();
        match args.command {
            Commands::Ingest { file } => assert_eq!(file, PathBuf::from("contract.pdf")),
            _ => panic!("expected ingest subcommand"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["lexbot"]).is_err());
    }
}
