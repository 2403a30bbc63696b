//! quarry-retriever: document ingestion, vector indexing, and semantic search
//!
//! This crate turns uploaded documents into searchable, vector-indexed
//! knowledge and serves semantic queries against it. Documents are chunked
//! (via `quarry-chunk`), embedded in batches (via `quarry-embed`), and stored
//! in SQLite; a per-document state machine governs when and how processing
//! runs, with retry bookkeeping and operator notifications on hard failures.
//!
//! ## Key Modules
//!
//! - **[`pipeline`]**: the processing orchestrator, state machine, and job dispatch
//! - **[`storage`]**: SQLite store for documents, chunks, and the search log
//! - **[`search`]**: semantic search service with thresholding and ranking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry_retriever::pipeline::{NewDocument, ProcessingConfig, ProcessingEngine};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = ProcessingEngine::new(Path::new("."), ProcessingConfig::default()).await?;
//!
//! engine
//!     .on_document_created(NewDocument {
//!         owner: "alice".to_string(),
//!         filename: "q3.txt".to_string(),
//!         file_path: "uploads/q3.txt".to_string(),
//!         doc_type: "income_statement".to_string(),
//!         size_bytes: 12_288,
//!         mode: None,
//!     })
//!     .await?;
//!
//! engine.process_pending_jobs().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Document → TextExtractor → Chunker → EmbeddingProvider → SQLite Storage
//!    ↑                                                          ↓
//! on_document_created → Dispatch → ProcessingEngine ← SemanticSearchService
//! ```

pub mod pipeline;
pub mod search;
pub mod storage;
