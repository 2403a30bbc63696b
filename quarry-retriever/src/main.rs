use clap::{Parser, Subcommand};
use quarry_embed::{EmbedConfig, EmbedError, RemoteEmbeddingProvider};
use quarry_retriever::pipeline::{
    Dispatch, NewDocument, ProcessingConfig, ProcessingEngine, ProcessingJob, ProcessingMode,
};
use quarry_retriever::search::{SearchOptions, SemanticSearchService};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// A CLI tool to ingest documents into the quarry index and search them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory containing the .quarry.db database file
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the document database
    Init,
    /// Register a document and process it according to its mode
    Ingest {
        /// Path to the document file
        file: PathBuf,
        /// Owning user of the document
        #[arg(short, long)]
        owner: String,
        /// Declared document type (drives the processing-mode rules)
        #[arg(short, long, default_value = "other")]
        doc_type: String,
        /// Override the decided processing mode
        #[arg(short, long)]
        mode: Option<ProcessingMode>,
        /// Skip embedding generation (only chunk)
        #[arg(long)]
        skip_embeddings: bool,
    },
    /// Process one document by ID
    Process {
        /// Document ID
        document_id: i64,
        /// Skip embedding generation (only chunk)
        #[arg(long)]
        skip_embeddings: bool,
    },
    /// Process all pending batch-mode documents (the nightly sweep)
    Sweep,
    /// Reset all failed documents and re-queue them
    RetryFailed,
    /// Semantic search over embedded chunks
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Minimum similarity score (0.0 to 1.0)
        #[arg(short, long, default_value_t = 0.7)]
        threshold: f32,
        /// Restrict the search to one document
        #[arg(long)]
        document_id: Option<i64>,
        /// Restrict the search to one owner's documents
        #[arg(short, long)]
        owner: Option<String>,
        /// Emit results as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Show database statistics
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Init => {
            ProcessingEngine::new(&args.base_dir, ProcessingConfig::default()).await?;
            println!("Initialized index in {}", args.base_dir.display());
        }
        Commands::Ingest {
            file,
            owner,
            doc_type,
            mode,
            skip_embeddings,
        } => {
            let engine = build_engine(&args.base_dir, !skip_embeddings).await?;

            let metadata = tokio::fs::metadata(&file).await?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            let document = engine
                .on_document_created(NewDocument {
                    owner,
                    filename,
                    file_path: file.to_string_lossy().into_owned(),
                    doc_type,
                    size_bytes: metadata.len(),
                    mode,
                })
                .await?;

            // Immediate-mode jobs are queued; drain them now so the CLI
            // call leaves the document in its final state
            engine.process_pending_jobs().await?;

            let id = document.id.unwrap_or_default();
            let refreshed = engine.index().get_document(id).await?;
            let status = refreshed.map(|d| d.status).unwrap_or(document.status);
            println!(
                "Document {id}: mode {}, status {status}",
                document.mode
            );
        }
        Commands::Process {
            document_id,
            skip_embeddings,
        } => {
            let engine = build_engine(&args.base_dir, !skip_embeddings).await?;
            let job = if skip_embeddings {
                ProcessingJob::without_embeddings(document_id)
            } else {
                ProcessingJob::new(document_id)
            };

            let outcome = engine.process_document(&job).await;
            if outcome.success {
                println!(
                    "Document {document_id}: {} chunks, {} embeddings",
                    outcome.chunks_created, outcome.embeddings_generated
                );
            } else {
                anyhow::bail!(
                    "processing failed: {}",
                    outcome.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }
        Commands::Sweep => {
            let engine = build_engine(&args.base_dir, true).await?;
            let summary = engine.run_batch_sweep().await?;
            println!(
                "Batch sweep: {}/{} successful, {} failed",
                summary.succeeded, summary.total, summary.failed
            );
            for error in &summary.errors {
                println!(
                    "  failed: document {} ({}): {}",
                    error.document_id, error.filename, error.error
                );
            }
        }
        Commands::RetryFailed => {
            let engine = build_engine(&args.base_dir, true).await?;
            let ids = engine.retry_failed().await?;
            engine.process_pending_jobs().await?;
            println!("Re-queued {} failed documents", ids.len());
        }
        Commands::Search {
            query,
            limit,
            threshold,
            document_id,
            owner,
            json,
        } => {
            let provider = RemoteEmbeddingProvider::new(EmbedConfig::from_env())?;
            let engine =
                ProcessingEngine::new(&args.base_dir, ProcessingConfig::default()).await?;
            let service =
                SemanticSearchService::new(engine.index().clone(), Arc::new(provider));

            let hits = service
                .search(
                    &query,
                    &SearchOptions {
                        limit,
                        similarity_threshold: threshold,
                        document_id,
                        owner: owner.clone(),
                        user: owner,
                        log_query: true,
                    },
                )
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No results above threshold {threshold}");
            } else {
                for hit in &hits {
                    let preview: String = hit.chunk.content.chars().take(100).collect();
                    println!(
                        "#{} [{:.3}] document {} chunk {}: {preview}",
                        hit.rank, hit.score, hit.chunk.document_id, hit.chunk.chunk_index
                    );
                }
            }
        }
        Commands::Stats => {
            let engine =
                ProcessingEngine::new(&args.base_dir, ProcessingConfig::default()).await?;
            let stats = engine.index().stats().await?;
            println!("Documents:        {}", stats.documents_count);
            println!("Chunks:           {}", stats.chunks_count);
            println!("Embedded chunks:  {}", stats.embedded_chunks_count);
            println!("Search queries:   {}", stats.search_queries_count);
        }
    }

    Ok(())
}

/// Build an engine with inline dispatch disabled (the CLI drains the queue
/// explicitly) and a remote embedding provider when one is configured.
async fn build_engine(base_dir: &std::path::Path, want_embeddings: bool) -> anyhow::Result<ProcessingEngine> {
    let engine = ProcessingEngine::new(base_dir, ProcessingConfig::default())
        .await?
        .with_dispatch(Dispatch::queued());

    if !want_embeddings {
        return Ok(engine);
    }

    match RemoteEmbeddingProvider::new(EmbedConfig::from_env()) {
        Ok(provider) => Ok(engine.with_provider(Arc::new(provider))),
        Err(EmbedError::MissingApiKey { env_var }) => {
            eprintln!("Warning: {env_var} not set, processing without embeddings");
            Ok(engine)
        }
        Err(e) => Err(e.into()),
    }
}
