//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use plenodoc_model::Provider;
use plenodoc_rag::{CondenseFallback, KnowledgeBaseConfig, RagConfig};
use plenodoc_telemetry::LogFormat;

/// PlenoDoc: chat with your documents
#[derive(Parser, Debug)]
#[command(name = "plenodoc")]
#[command(version)]
#[command(about = "Upload documents and ask questions about them", long_about = None)]
pub struct Cli {
    /// Directory holding the uploaded documents
    #[arg(long, env = "PLENODOC_DOCS_DIR", default_value = "documents", global = true)]
    pub docs_dir: PathBuf,

    /// Directory holding the vector index
    #[arg(long, env = "PLENODOC_INDEX_DIR", default_value = "vector_index", global = true)]
    pub index_dir: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, env = "PLENODOC_CHUNK_SIZE", default_value_t = 1000, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "PLENODOC_CHUNK_OVERLAP", default_value_t = 150, global = true)]
    pub chunk_overlap: usize,

    /// Passages retrieved per question
    #[arg(long, env = "PLENODOC_TOP_K", default_value_t = 4, global = true)]
    pub top_k: usize,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hashing, global = true)]
    pub embedder: EmbedderKind,

    /// Log output format (pretty or json)
    #[arg(long, env = "PLENODOC_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Local feature-hashing embeddings, no network
    Hashing,
    /// OpenAI embeddings API (needs OPENAI_API_KEY)
    Openai,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy files into the document set and update the index
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete a document and rebuild the index
    Remove { name: String },

    /// List documents in the knowledge base
    List,

    /// Rebuild the index from the document set
    Rebuild,

    /// Show knowledge base status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Model provider (groq or openai)
    #[arg(long)]
    pub provider: Provider,

    /// Model name; defaults to the provider's first catalogued model
    #[arg(long)]
    pub model: Option<String>,

    /// API key; defaults to GROQ_API_KEY or OPENAI_API_KEY
    #[arg(long)]
    pub api_key: Option<String>,

    /// Retrieve with the raw question when the follow-up rewrite fails
    #[arg(long)]
    pub raw_fallback: bool,
}

impl Cli {
    pub fn knowledge_base_config(&self) -> KnowledgeBaseConfig {
        KnowledgeBaseConfig { documents_dir: self.docs_dir.clone(), index_dir: self.index_dir.clone() }
    }

    /// Pipeline settings from the flags.
    pub fn rag_config(&self) -> plenodoc_rag::Result<RagConfig> {
        let fallback = match &self.command {
            Commands::Chat(args) if args.raw_fallback => CondenseFallback::UseRawQuestion,
            _ => CondenseFallback::Propagate,
        };
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .condense_fallback(fallback)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_with_global_flags() {
        let cli = Cli::try_parse_from([
            "plenodoc",
            "chat",
            "--provider",
            "groq",
            "--docs-dir",
            "/tmp/docs",
            "--raw-fallback",
        ])
        .unwrap();

        assert_eq!(cli.docs_dir, PathBuf::from("/tmp/docs"));
        let Commands::Chat(ref args) = cli.command else { panic!("expected chat") };
        assert_eq!(args.provider, Provider::Groq);
        assert!(args.model.is_none());
        assert_eq!(cli.rag_config().unwrap().condense_fallback, CondenseFallback::UseRawQuestion);
    }

    #[test]
    fn upload_requires_files() {
        assert!(Cli::try_parse_from(["plenodoc", "upload"]).is_err());
        let cli = Cli::try_parse_from(["plenodoc", "upload", "a.txt", "b.pdf"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { ref files } if files.len() == 2));
    }

    #[test]
    fn rejects_inconsistent_chunking() {
        let cli = Cli::try_parse_from(["plenodoc", "--chunk-size", "100", "--chunk-overlap", "100", "list"]).unwrap();
        assert!(cli.rag_config().is_err());
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["plenodoc", "chat", "--provider", "acme"]).is_err());
    }
}
