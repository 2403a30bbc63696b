//! Core SQLite database operations for document, chunk, and search-log
//! storage.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Documents: the pipeline's processing view of uploaded files
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     owner TEXT, filename TEXT, file_path TEXT, doc_type TEXT,
//!     size_bytes INTEGER,
//!     status TEXT,                     -- pending/processing/completed/failed/skipped
//!     mode TEXT,                       -- immediate/batch/manual
//!     retry_count INTEGER,
//!     last_error TEXT,
//!     processed_at TIMESTAMP
//! );
//!
//! -- Chunks: the searchable unit, with optional embedding vectors
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     document_id INTEGER REFERENCES documents(id),
//!     chunk_index INTEGER,             -- zero-based, contiguous per document
//!     content TEXT,
//!     embedding BLOB,                  -- f32 vector (optional)
//!     token_count INTEGER, char_count INTEGER
//! );
//! ```
//!
//! plus the append-only `search_queries` / `search_results` analytics log.
//!
//! ## SQLite Configuration
//!
//! - **WAL mode**: concurrent readers while processing jobs write
//! - **Busy timeout**: writers back off instead of failing immediately
//! - **Foreign keys**: chunk and search-log rows cascade with their parents

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::{ChunkFilter, ChunkRecord, DocumentId, IndexStats, SearchQueryRecord, SearchResultRecord};
use crate::pipeline::document::{Document, ProcessingMode, ProcessingStatus};

/// SQLite-backed store for the RAG pipeline.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct RagIndex {
    pool: SqlitePool,
}

impl RagIndex {
    /// Open the index with persistent SQLite storage under `base`.
    pub async fn open(base: &Path) -> Result<Self> {
        let db_path = base.join(".quarry.db");

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Open the index with in-memory SQLite storage for testing.
    ///
    /// Pinned to a single connection: every pooled connection would otherwise
    /// get its own empty in-memory database.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                mode TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                processed_at TIMESTAMP,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB,
                token_count INTEGER NOT NULL DEFAULT 0,
                char_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT unique_chunk UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT,
                query_text TEXT NOT NULL,
                query_embedding BLOB,
                results_count INTEGER NOT NULL DEFAULT 0,
                search_time_ms INTEGER,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_id INTEGER NOT NULL,
                chunk_id INTEGER NOT NULL,
                similarity_score REAL NOT NULL,
                result_rank INTEGER NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT unique_rank UNIQUE(query_id, result_rank),
                FOREIGN KEY (query_id) REFERENCES search_queries(id) ON DELETE CASCADE,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status, mode)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_search_results_query ON search_results(query_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // -- documents ---------------------------------------------------------

    /// Insert a new document record and return its ID.
    pub async fn insert_document(&self, document: &Document) -> Result<DocumentId> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (owner, filename, file_path, doc_type, size_bytes, status, mode, retry_count, last_error, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&document.owner)
        .bind(&document.filename)
        .bind(&document.file_path)
        .bind(&document.doc_type)
        .bind(document.size_bytes as i64)
        .bind(document.status.to_string())
        .bind(document.mode.to_string())
        .bind(document.retry_count as i64)
        .bind(&document.last_error)
        .bind(document.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch a document by ID.
    pub async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, owner, filename, file_path, doc_type, size_bytes, status, mode, retry_count, last_error, processed_at
             FROM documents WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_document).transpose()
    }

    /// Set a document's processing status.
    pub async fn set_document_status(&self, id: DocumentId, status: ProcessingStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ?1 WHERE id = ?2")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a document completed: set the processed timestamp and clear the
    /// error field.
    pub async fn mark_document_completed(&self, id: DocumentId) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET status = 'completed', processed_at = ?1, last_error = NULL WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a document failed, record the error, and increment the retry
    /// counter. Returns the new retry count.
    pub async fn mark_document_failed(&self, id: DocumentId, error: &str) -> Result<u32> {
        let row = sqlx::query(
            "UPDATE documents SET status = 'failed', last_error = ?1, retry_count = retry_count + 1
             WHERE id = ?2 RETURNING retry_count",
        )
        .bind(error)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let retry_count: i64 = row.get("retry_count");
        Ok(retry_count as u32)
    }

    /// Operator reset: move all failed documents back to `pending` with a
    /// zeroed retry counter. Returns the affected document IDs.
    pub async fn reset_failed_documents(&self) -> Result<Vec<DocumentId>> {
        let rows = sqlx::query(
            "UPDATE documents SET status = 'pending', retry_count = 0, last_error = NULL
             WHERE status = 'failed' RETURNING id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// All documents waiting for the periodic batch sweep.
    pub async fn pending_batch_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, owner, filename, file_path, doc_type, size_bytes, status, mode, retry_count, last_error, processed_at
             FROM documents WHERE status = 'pending' AND mode = 'batch' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_document).collect()
    }

    // -- chunks ------------------------------------------------------------

    /// Replace a document's chunk set in one transaction.
    ///
    /// Deletes any pre-existing chunks and bulk-inserts the new set, so a
    /// concurrent reader never observes a document with a partial chunk set
    /// mid-reprocessing.
    pub async fn replace_chunks(&self, document_id: DocumentId, chunks: &[ChunkRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            let embedding_bytes = chunk
                .embedding
                .as_ref()
                .map(|e| bytemuck::cast_slice::<f32, u8>(e));

            sqlx::query(
                r#"
                INSERT INTO chunks (document_id, chunk_index, content, embedding, token_count, char_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(embedding_bytes)
            .bind(chunk.token_count as i64)
            .bind(chunk.char_count as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    /// Persist one chunk's embedding, keyed by document and index.
    ///
    /// Called per chunk as vectors arrive, so partial progress survives a
    /// crash mid-batch.
    pub async fn set_chunk_embedding(
        &self,
        document_id: DocumentId,
        chunk_index: usize,
        embedding: &[f32],
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chunks SET embedding = ?1, updated_at = datetime('now')
             WHERE document_id = ?2 AND chunk_index = ?3",
        )
        .bind(bytemuck::cast_slice::<f32, u8>(embedding))
        .bind(document_id)
        .bind(chunk_index as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            anyhow::bail!("no chunk at index {chunk_index} for document {document_id}");
        }
        Ok(())
    }

    /// Get all chunks of a document, ordered by chunk index.
    pub async fn chunks_for_document(&self, document_id: DocumentId) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding, token_count, char_count
             FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_chunk).collect())
    }

    /// Get a chunk by ID.
    pub async fn get_chunk(&self, id: i64) -> Result<Option<ChunkRecord>> {
        let row = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding, token_count, char_count
             FROM chunks WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_chunk))
    }

    /// All chunks carrying an embedding, with optional equality filters.
    pub async fn embedded_chunks(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let mut sql = String::from(
            "SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding, c.token_count, c.char_count
             FROM chunks c JOIN documents d ON d.id = c.document_id
             WHERE c.embedding IS NOT NULL",
        );
        if filter.document_id.is_some() {
            sql.push_str(" AND c.document_id = ?");
        }
        if filter.owner.is_some() {
            sql.push_str(" AND d.owner = ?");
        }
        sql.push_str(" ORDER BY c.document_id, c.chunk_index");

        let mut query = sqlx::query(&sql);
        if let Some(document_id) = filter.document_id {
            query = query.bind(document_id);
        }
        if let Some(owner) = &filter.owner {
            query = query.bind(owner);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_chunk).collect())
    }

    // -- search log --------------------------------------------------------

    /// Append a search query and its results to the analytics log in one
    /// transaction. Returns the query's ID.
    pub async fn log_search(
        &self,
        query: &SearchQueryRecord,
        results: &[SearchResultRecord],
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let embedding_bytes = query
            .query_embedding
            .as_ref()
            .map(|e| bytemuck::cast_slice::<f32, u8>(e));

        let inserted = sqlx::query(
            r#"
            INSERT INTO search_queries (user, query_text, query_embedding, results_count, search_time_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&query.user)
        .bind(&query.query_text)
        .bind(embedding_bytes)
        .bind(query.results_count as i64)
        .bind(query.search_time_ms as i64)
        .execute(&mut *tx)
        .await?;

        let query_id = inserted.last_insert_rowid();

        for result in results {
            sqlx::query(
                "INSERT INTO search_results (query_id, chunk_id, similarity_score, result_rank)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(query_id)
            .bind(result.chunk_id)
            .bind(result.similarity_score)
            .bind(result.rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(query_id)
    }

    // -- stats -------------------------------------------------------------

    /// Aggregate counts over the stored index.
    pub async fn stats(&self) -> Result<IndexStats> {
        let documents_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let embedded_chunks_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        let search_queries_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_queries")
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexStats {
            documents_count: documents_count as usize,
            chunks_count: chunks_count as usize,
            embedded_chunks_count: embedded_chunks_count as usize,
            search_queries_count: search_queries_count as usize,
        })
    }

    /// Get the underlying SQLite connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    let mode: String = row.get("mode");
    let size_bytes: i64 = row.get("size_bytes");
    let retry_count: i64 = row.get("retry_count");
    let processed_at: Option<DateTime<Utc>> = row.get("processed_at");

    Ok(Document {
        id: Some(row.get("id")),
        owner: row.get("owner"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        doc_type: row.get("doc_type"),
        size_bytes: size_bytes as u64,
        status: ProcessingStatus::from_str(&status).map_err(anyhow::Error::msg)?,
        mode: ProcessingMode::from_str(&mode).map_err(anyhow::Error::msg)?,
        retry_count: retry_count as u32,
        last_error: row.get("last_error"),
        processed_at,
    })
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> ChunkRecord {
    let chunk_index: i64 = row.get("chunk_index");
    let token_count: i64 = row.get("token_count");
    let char_count: i64 = row.get("char_count");
    let embedding_bytes: Option<Vec<u8>> = row.get("embedding");

    // pod_collect_to_vec tolerates the unaligned byte buffers sqlx hands back
    let embedding = embedding_bytes.map(|bytes| bytemuck::pod_collect_to_vec::<u8, f32>(&bytes));

    ChunkRecord {
        id: Some(row.get("id")),
        document_id: row.get("document_id"),
        chunk_index: chunk_index as usize,
        content: row.get("content"),
        embedding,
        token_count: token_count as usize,
        char_count: char_count as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        Document::new(
            "alice",
            "report.pdf",
            "/tmp/report.pdf",
            "income_statement",
            4096,
            ProcessingMode::Immediate,
        )
    }

    fn sample_chunks(document_id: DocumentId, count: usize) -> Vec<ChunkRecord> {
        (0..count)
            .map(|i| ChunkRecord {
                id: None,
                document_id,
                chunk_index: i,
                content: format!("chunk number {i}"),
                embedding: None,
                token_count: 4,
                char_count: 16,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_document_round_trip() -> Result<()> {
        let index = RagIndex::open_memory().await?;

        let id = index.insert_document(&sample_document()).await?;
        let fetched = index.get_document(id).await?.unwrap();

        assert_eq!(fetched.owner, "alice");
        assert_eq!(fetched.filename, "report.pdf");
        assert_eq!(fetched.status, ProcessingStatus::Pending);
        assert_eq!(fetched.mode, ProcessingMode::Immediate);
        assert_eq!(fetched.retry_count, 0);
        assert!(fetched.processed_at.is_none());

        assert!(index.get_document(id + 1).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_status_transitions() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let id = index.insert_document(&sample_document()).await?;

        index
            .set_document_status(id, ProcessingStatus::Processing)
            .await?;
        assert_eq!(
            index.get_document(id).await?.unwrap().status,
            ProcessingStatus::Processing
        );

        let retry_count = index.mark_document_failed(id, "no text extracted").await?;
        assert_eq!(retry_count, 1);
        let doc = index.get_document(id).await?.unwrap();
        assert_eq!(doc.status, ProcessingStatus::Failed);
        assert_eq!(doc.last_error.as_deref(), Some("no text extracted"));

        index.mark_document_completed(id).await?;
        let doc = index.get_document(id).await?.unwrap();
        assert_eq!(doc.status, ProcessingStatus::Completed);
        assert!(doc.last_error.is_none());
        assert!(doc.processed_at.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_reset_failed_documents() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let failed = index.insert_document(&sample_document()).await?;
        let completed = index.insert_document(&sample_document()).await?;

        index.mark_document_failed(failed, "boom").await?;
        index.mark_document_failed(failed, "boom again").await?;
        index.mark_document_completed(completed).await?;

        let reset = index.reset_failed_documents().await?;
        assert_eq!(reset, vec![failed]);

        let doc = index.get_document(failed).await?.unwrap();
        assert_eq!(doc.status, ProcessingStatus::Pending);
        assert_eq!(doc.retry_count, 0);
        assert!(doc.last_error.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_chunks_is_full_replacement() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let id = index.insert_document(&sample_document()).await?;

        index.replace_chunks(id, &sample_chunks(id, 5)).await?;
        assert_eq!(index.chunks_for_document(id).await?.len(), 5);

        // Reprocessing with fewer chunks leaves no orphans behind
        index.replace_chunks(id, &sample_chunks(id, 2)).await?;
        let chunks = index.chunks_for_document(id).await?;
        assert_eq!(chunks.len(), 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_chunk_embedding_round_trip() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let id = index.insert_document(&sample_document()).await?;
        index.replace_chunks(id, &sample_chunks(id, 2)).await?;

        index
            .set_chunk_embedding(id, 0, &[0.25, -0.5, 1.0])
            .await?;

        let chunks = index.chunks_for_document(id).await?;
        assert_eq!(chunks[0].embedding, Some(vec![0.25, -0.5, 1.0]));
        assert_eq!(chunks[1].embedding, None);

        // Updating a missing index is an error, not a silent no-op
        assert!(index.set_chunk_embedding(id, 7, &[0.0]).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_embedded_chunks_filters() -> Result<()> {
        let index = RagIndex::open_memory().await?;

        let mut doc_a = sample_document();
        doc_a.owner = "alice".to_string();
        let a = index.insert_document(&doc_a).await?;

        let mut doc_b = sample_document();
        doc_b.owner = "bob".to_string();
        let b = index.insert_document(&doc_b).await?;

        index.replace_chunks(a, &sample_chunks(a, 2)).await?;
        index.replace_chunks(b, &sample_chunks(b, 1)).await?;
        index.set_chunk_embedding(a, 0, &[1.0, 0.0]).await?;
        index.set_chunk_embedding(b, 0, &[0.0, 1.0]).await?;

        // Only embedded chunks are candidates
        let all = index.embedded_chunks(&ChunkFilter::default()).await?;
        assert_eq!(all.len(), 2);

        let only_a = index
            .embedded_chunks(&ChunkFilter {
                document_id: Some(a),
                ..Default::default()
            })
            .await?;
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].document_id, a);

        let only_bob = index
            .embedded_chunks(&ChunkFilter {
                owner: Some("bob".to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(only_bob.len(), 1);
        assert_eq!(only_bob[0].document_id, b);

        Ok(())
    }

    #[tokio::test]
    async fn test_log_search() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let id = index.insert_document(&sample_document()).await?;
        index.replace_chunks(id, &sample_chunks(id, 2)).await?;
        let chunks = index.chunks_for_document(id).await?;

        let query = SearchQueryRecord {
            user: Some("alice".to_string()),
            query_text: "quarterly revenue".to_string(),
            query_embedding: Some(vec![0.1, 0.2]),
            results_count: 2,
            search_time_ms: 12,
        };
        let results: Vec<SearchResultRecord> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| SearchResultRecord {
                chunk_id: chunk.id.unwrap(),
                similarity_score: 0.9 - i as f32 * 0.1,
                rank: i + 1,
            })
            .collect();

        let query_id = index.log_search(&query, &results).await?;
        assert!(query_id > 0);

        let stats = index.stats().await?;
        assert_eq!(stats.search_queries_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_stats() -> Result<()> {
        let index = RagIndex::open_memory().await?;
        let id = index.insert_document(&sample_document()).await?;
        index.replace_chunks(id, &sample_chunks(id, 3)).await?;
        index.set_chunk_embedding(id, 1, &[0.5]).await?;

        let stats = index.stats().await?;
        assert_eq!(stats.documents_count, 1);
        assert_eq!(stats.chunks_count, 3);
        assert_eq!(stats.embedded_chunks_count, 1);
        assert_eq!(stats.search_queries_count, 0);

        Ok(())
    }
}
