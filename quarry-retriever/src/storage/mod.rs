//! Storage layer for quarry-retriever
//!
//! This module holds the record types persisted by the pipeline and the
//! SQLite-backed store that owns them. Chunks are the searchable unit;
//! search queries and their results form an append-only analytics log.
//!
//! ## Key Components
//!
//! - **RagIndex**: SQLite store for documents, chunks, and the search log
//! - **ChunkRecord**: a chunk row with its optional embedding vector
//! - **SearchQueryRecord / SearchResultRecord**: the search analytics log
//!
//! ## Lifecycle
//!
//! Chunks for a document are fully replaced (delete-then-insert, in one
//! transaction) whenever the document is reprocessed; embeddings are then
//! attached per chunk as they arrive. Search log rows are written once and
//! never updated.

pub mod rag_index;

pub use rag_index::RagIndex;

/// Database ID for a document.
pub type DocumentId = i64;

/// Database ID for a chunk.
pub type ChunkId = i64;

/// A chunk row: content plus optional embedding, tied to one document.
///
/// `chunk_index` is zero-based and unique within the document; a successfully
/// processed document always has contiguous indices `0..N`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChunkRecord {
    pub id: Option<ChunkId>,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub content: String,
    /// Absent until embedding succeeds for this chunk.
    pub embedding: Option<Vec<f32>>,
    pub token_count: usize,
    pub char_count: usize,
}

/// A search query log row. Created once per search call, immutable after.
#[derive(Debug, Clone)]
pub struct SearchQueryRecord {
    pub user: Option<String>,
    pub query_text: String,
    pub query_embedding: Option<Vec<f32>>,
    pub results_count: usize,
    pub search_time_ms: u64,
}

/// A search result log row: one hit of one query, with its 1-indexed rank.
#[derive(Debug, Clone)]
pub struct SearchResultRecord {
    pub chunk_id: ChunkId,
    pub similarity_score: f32,
    pub rank: usize,
}

/// Equality filters applied when collecting embedded chunks for search.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    /// Restrict to chunks of one document.
    pub document_id: Option<DocumentId>,
    /// Restrict to chunks of documents owned by one user.
    pub owner: Option<String>,
}

/// Aggregate counts over the stored index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub documents_count: usize,
    pub chunks_count: usize,
    pub embedded_chunks_count: usize,
    pub search_queries_count: usize,
}
