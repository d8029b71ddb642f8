//! Subcommand handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use plenodoc_model::ModelSelection;
use plenodoc_rag::openai::OpenAIEmbeddingProvider;
use plenodoc_rag::{
    ChatSession, EmbeddingProvider, HashingEmbedder, IngestMode, IngestReport, KnowledgeBase, RagError,
};
use tracing::info;

use crate::cli::{ChatArgs, Cli, Commands, EmbedderKind};
use crate::repl;

/// Run the parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.rag_config().context("invalid chunking or retrieval settings")?;
    let knowledge = KnowledgeBase::open(&cli.knowledge_base_config(), config, embedder(cli.embedder)?)?;
    info!(
        documents = %cli.docs_dir.display(),
        index = %cli.index_dir.display(),
        embedder = knowledge.store().embedder().name(),
        "knowledge base opened"
    );

    match cli.command {
        Commands::Upload { files } => upload(&knowledge, &files).await,
        Commands::Remove { name } => remove(&knowledge, &name).await,
        Commands::List => list(&knowledge).await,
        Commands::Rebuild => rebuild(&knowledge).await,
        Commands::Status { json } => status(&knowledge, json).await,
        Commands::Chat(args) => chat(knowledge, args).await,
    }
}

fn embedder(kind: EmbedderKind) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(match kind {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::default()),
        EmbedderKind::Openai => Arc::new(OpenAIEmbeddingProvider::from_env()?),
    })
}

async fn upload(knowledge: &KnowledgeBase, files: &[PathBuf]) -> Result<()> {
    let report = knowledge.upload(files).await?;
    print_report(&report);
    Ok(())
}

async fn remove(knowledge: &KnowledgeBase, name: &str) -> Result<()> {
    let report = knowledge.remove(name).await?;
    if report.mode == IngestMode::Unchanged {
        return Err(anyhow!("no document named '{name}'"));
    }
    println!("Removed {name}.");
    print_report(&report);
    Ok(())
}

async fn list(knowledge: &KnowledgeBase) -> Result<()> {
    let names = knowledge.documents().list().await?;
    if names.is_empty() {
        println!("The knowledge base is empty.");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn rebuild(knowledge: &KnowledgeBase) -> Result<()> {
    let report = knowledge.rebuild().await?;
    print_report(&report);
    Ok(())
}

async fn status(knowledge: &KnowledgeBase, json: bool) -> Result<()> {
    let status = knowledge.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Documents: {}", status.documents.len());
    for name in &status.documents {
        println!("  {name}");
    }
    match (&status.index, &status.index_error) {
        (Some(index), _) => {
            println!(
                "Index: {} chunks from {} documents, {} ({} dimensions), generation {}, built {}",
                index.entries,
                index.sources,
                index.embedding_model,
                index.dimensions,
                index.generation,
                index.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        (None, Some(error)) => println!("Index: unreadable ({error}); run `plenodoc rebuild`"),
        (None, None) => println!("Index: not built yet"),
    }
    Ok(())
}

async fn chat(knowledge: KnowledgeBase, args: ChatArgs) -> Result<()> {
    let selection = match args.model {
        Some(model) => ModelSelection::new(args.provider, model).map_err(|message| anyhow!(message))?,
        None => ModelSelection::default_for(args.provider),
    };
    let api_key = args
        .api_key
        .or_else(|| std::env::var(args.provider.api_key_env()).ok())
        .unwrap_or_default();

    let mut session = ChatSession::new(knowledge);
    match session.connect_model(&selection, &api_key).await {
        Ok(()) => {}
        Err(RagError::NoCredential { provider }) => {
            return Err(anyhow!(
                "an API key is required for {provider}: pass --api-key or set {}",
                args.provider.api_key_env()
            ));
        }
        Err(err @ RagError::RetrieverNotReady) => {
            return Err(anyhow!("{err}. Run `plenodoc upload <FILE>...`"));
        }
        Err(err) => return Err(err).context("could not initialize the chat model"),
    }

    println!("Model {} ({}) ready.", selection.model, selection.provider.display_name());
    repl::run(session).await
}

fn print_report(report: &IngestReport) {
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if !report.stored.is_empty() {
        println!("Stored: {}", report.stored.join(", "));
    }
    match report.mode {
        IngestMode::Incremental => {
            println!("Index updated: {} chunks added from {} documents.", report.chunks, report.documents)
        }
        IngestMode::Full => {
            println!("Index rebuilt: {} chunks from {} documents.", report.chunks, report.documents)
        }
        IngestMode::Deleted => println!("No content left; index deleted."),
        IngestMode::Unchanged => println!("Nothing to index."),
    }
}
