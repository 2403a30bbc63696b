//! Semantic search over stored document chunks.
//!
//! Embeds the query text, scores every embedded chunk by vector similarity,
//! applies a hard threshold, and returns the top hits with contiguous
//! 1-indexed ranks. Search-time failures never surface to the caller: a
//! query that cannot be embedded (or a store error) degrades to an empty
//! result set, logged for diagnosis.
//!
//! ## Scores
//!
//! Cosine distance between two vectors lies in `[0, 2]`; it is mapped to a
//! similarity score in `[0, 1]` via `1 - distance/2` (higher = more
//! similar). The `similarity_threshold` is a hard filter on that score.
//!
//! ## Query log
//!
//! Each search call optionally appends one [`SearchQueryRecord`] and one
//! [`SearchResultRecord`] per hit to the analytics log. Logging is
//! best-effort: a failure to log is a warning, never a failed search.

use quarry_embed::EmbeddingProvider;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::storage::{
    ChunkFilter, ChunkId, ChunkRecord, DocumentId, RagIndex, SearchQueryRecord, SearchResultRecord,
};

/// A single search hit: a chunk, its similarity score, and its 1-indexed rank.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub chunk: ChunkRecord,
    pub score: f32,
    pub rank: usize,
}

/// Options for a search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits returned.
    pub limit: usize,
    /// Hard lower bound on the similarity score of returned hits.
    pub similarity_threshold: f32,
    /// Restrict the search to one document.
    pub document_id: Option<DocumentId>,
    /// Restrict the search to documents owned by one user.
    pub owner: Option<String>,
    /// User recorded in the query log.
    pub user: Option<String>,
    /// Whether to append this call to the query log.
    pub log_query: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            similarity_threshold: 0.7,
            document_id: None,
            owner: None,
            user: None,
            log_query: true,
        }
    }
}

/// Service performing semantic search over the chunk store.
pub struct SemanticSearchService {
    index: RagIndex,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticSearchService {
    pub fn new(index: RagIndex, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    /// Perform a semantic search for `query_text`.
    ///
    /// Never fails: embedding or store errors degrade to an empty result
    /// set ("no context found") and are logged.
    pub async fn search(&self, query_text: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let start = Instant::now();

        let query_vector = match self.provider.embed_text(query_text).await {
            Ok(Some(vector)) => vector,
            Ok(None) => {
                error!("failed to generate query embedding");
                return Vec::new();
            }
            Err(e) => {
                error!(error = %e, "failed to generate query embedding");
                return Vec::new();
            }
        };

        let filter = ChunkFilter {
            document_id: options.document_id,
            owner: options.owner.clone(),
        };

        let hits = match self
            .vector_search(&query_vector, options.similarity_threshold, options.limit, &filter)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                error!(error = %e, "vector search failed");
                return Vec::new();
            }
        };

        let search_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            results = hits.len(),
            search_time_ms, "search completed for '{query_text}'"
        );

        if options.log_query {
            self.log_search(query_text, Some(query_vector), &hits, search_time_ms, options)
                .await;
        }

        hits
    }

    /// Find chunks similar to an existing chunk, seeded by its stored
    /// vector instead of a freshly embedded query.
    pub async fn similar_chunks(
        &self,
        chunk_id: ChunkId,
        limit: usize,
        exclude_same_document: bool,
    ) -> Vec<SearchHit> {
        let chunk = match self.index.get_chunk(chunk_id).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                warn!(chunk_id, "chunk not found");
                return Vec::new();
            }
            Err(e) => {
                error!(chunk_id, error = %e, "failed to load chunk");
                return Vec::new();
            }
        };

        let Some(seed) = chunk.embedding.as_deref() else {
            warn!(chunk_id, "chunk has no embedding");
            return Vec::new();
        };

        let candidates = match self.index.embedded_chunks(&ChunkFilter::default()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "vector search failed");
                return Vec::new();
            }
        };

        let mut hits: Vec<(ChunkRecord, f32)> = candidates
            .into_iter()
            .filter(|candidate| candidate.id != chunk.id)
            .filter(|candidate| !exclude_same_document || candidate.document_id != chunk.document_id)
            .filter_map(|candidate| {
                let score = score_against(seed, candidate.embedding.as_deref()?)?;
                Some((candidate, score))
            })
            .collect();

        rank_hits(&mut hits, 0.0, limit)
    }

    /// Nearest-neighbor scan over all embedded chunks passing the filter.
    async fn vector_search(
        &self,
        query: &[f32],
        similarity_threshold: f32,
        limit: usize,
        filter: &ChunkFilter,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let candidates = self.index.embedded_chunks(filter).await?;

        let mut hits: Vec<(ChunkRecord, f32)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = score_against(query, candidate.embedding.as_deref()?)?;
                Some((candidate, score))
            })
            .collect();

        Ok(rank_hits(&mut hits, similarity_threshold, limit))
    }

    /// Append the query and its hits to the analytics log, best-effort.
    async fn log_search(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f32>>,
        hits: &[SearchHit],
        search_time_ms: u64,
        options: &SearchOptions,
    ) {
        let query = SearchQueryRecord {
            user: options.user.clone(),
            query_text: query_text.to_string(),
            query_embedding,
            results_count: hits.len(),
            search_time_ms,
        };

        let results: Vec<SearchResultRecord> = hits
            .iter()
            .filter_map(|hit| {
                Some(SearchResultRecord {
                    chunk_id: hit.chunk.id?,
                    similarity_score: hit.score,
                    rank: hit.rank,
                })
            })
            .collect();

        if let Err(e) = self.index.log_search(&query, &results).await {
            warn!(error = %e, "failed to log search query");
        }
    }
}

/// Similarity score of a candidate vector against the query vector.
///
/// Returns `None` when the dimensions differ (a stale vector from a
/// different model cannot be compared).
fn score_against(query: &[f32], candidate: &[f32]) -> Option<f32> {
    if query.len() != candidate.len() {
        return None;
    }
    let distance = 1.0 - cosine_similarity(query, candidate);
    Some(1.0 - distance / 2.0)
}

/// Threshold-filter, sort descending, truncate, and rank from 1.
fn rank_hits(
    hits: &mut Vec<(ChunkRecord, f32)>,
    similarity_threshold: f32,
    limit: usize,
) -> Vec<SearchHit> {
    hits.retain(|(_, score)| *score >= similarity_threshold);
    hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);

    hits.drain(..)
        .enumerate()
        .map(|(i, (chunk, score))| SearchHit {
            chunk,
            score,
            rank: i + 1,
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::document::{Document, ProcessingMode};
    use async_trait::async_trait;

    /// Provider answering every query with one fixed vector.
    struct FixedQueryProvider {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedQueryProvider {
        async fn embed_texts(&self, texts: &[String]) -> quarry_embed::Result<Vec<Option<Vec<f32>>>> {
            Ok(vec![Some(self.vector.clone()); texts.len()])
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }
    }

    /// Provider whose single-item batches always fail.
    struct FailingQueryProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingQueryProvider {
        async fn embed_texts(&self, texts: &[String]) -> quarry_embed::Result<Vec<Option<Vec<f32>>>> {
            Ok(vec![None; texts.len()])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    async fn seed_document(index: &RagIndex, owner: &str, vectors: &[[f32; 2]]) -> DocumentId {
        let document = Document::new(
            owner,
            "report.txt",
            "/tmp/report.txt",
            "other",
            1024,
            ProcessingMode::Manual,
        );
        let id = index.insert_document(&document).await.unwrap();

        let chunks: Vec<ChunkRecord> = vectors
            .iter()
            .enumerate()
            .map(|(i, _)| ChunkRecord {
                id: None,
                document_id: id,
                chunk_index: i,
                content: format!("chunk {i} of {owner}"),
                embedding: None,
                token_count: 4,
                char_count: 16,
            })
            .collect();
        index.replace_chunks(id, &chunks).await.unwrap();

        for (i, vector) in vectors.iter().enumerate() {
            index.set_chunk_embedding(id, i, vector).await.unwrap();
        }

        id
    }

    fn service(index: &RagIndex, query_vector: Vec<f32>) -> SemanticSearchService {
        SemanticSearchService::new(
            index.clone(),
            Arc::new(FixedQueryProvider {
                vector: query_vector,
            }),
        )
    }

    #[test]
    fn test_score_mapping() {
        // Identical vectors: distance 0, score 1
        assert!((score_against(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        // Orthogonal: distance 1, score 0.5
        assert!((score_against(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 0.5).abs() < 1e-6);
        // Opposite: distance 2, score 0
        assert!(score_against(&[1.0, 0.0], &[-1.0, 0.0]).unwrap().abs() < 1e-6);
        // Dimension mismatch: not comparable
        assert!(score_against(&[1.0, 0.0], &[1.0]).is_none());
    }

    #[tokio::test]
    async fn test_threshold_is_hard_and_ranks_are_contiguous() {
        let index = RagIndex::open_memory().await.unwrap();

        // Three chunks above the 0.7 threshold (scores 1.0, 0.9, 0.8) and
        // seven below it, against the query vector [1, 0]
        seed_document(
            &index,
            "alice",
            &[
                [1.0, 0.0],   // score 1.0
                [0.8, 0.6],   // score 0.9
                [0.6, 0.8],   // score 0.8
                [0.0, 1.0],   // score 0.5
                [0.2, 0.98],  // ~0.6
                [-0.6, 0.8],  // 0.2
                [-1.0, 0.0],  // 0.0
                [-0.8, 0.6],  // 0.1
                [0.1, 1.0],   // ~0.55
                [-0.2, 0.98], // ~0.4
            ],
        )
        .await;

        let service = service(&index, vec![1.0, 0.0]);
        let hits = service
            .search(
                "revenue",
                &SearchOptions {
                    limit: 5,
                    ..SearchOptions::default()
                },
            )
            .await;

        assert_eq!(hits.len(), 3);
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.rank, i + 1);
            assert!(hit.score >= 0.7, "score {} below threshold", hit.score);
        }
        // Descending by score
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
        assert_eq!(hits[0].chunk.chunk_index, 0);
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let index = RagIndex::open_memory().await.unwrap();
        seed_document(
            &index,
            "alice",
            &[[1.0, 0.0], [0.9, 0.1], [0.8, 0.2], [0.7, 0.3]],
        )
        .await;

        let service = service(&index, vec![1.0, 0.0]);
        let hits = service
            .search(
                "q",
                &SearchOptions {
                    limit: 2,
                    similarity_threshold: 0.0,
                    ..SearchOptions::default()
                },
            )
            .await;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
    }

    #[tokio::test]
    async fn test_filters_restrict_candidates() {
        let index = RagIndex::open_memory().await.unwrap();
        let alice_doc = seed_document(&index, "alice", &[[1.0, 0.0]]).await;
        let bob_doc = seed_document(&index, "bob", &[[1.0, 0.0]]).await;

        let service = service(&index, vec![1.0, 0.0]);

        let alice_hits = service
            .search(
                "q",
                &SearchOptions {
                    owner: Some("alice".to_string()),
                    ..SearchOptions::default()
                },
            )
            .await;
        assert_eq!(alice_hits.len(), 1);
        assert_eq!(alice_hits[0].chunk.document_id, alice_doc);

        let doc_hits = service
            .search(
                "q",
                &SearchOptions {
                    document_id: Some(bob_doc),
                    ..SearchOptions::default()
                },
            )
            .await;
        assert_eq!(doc_hits.len(), 1);
        assert_eq!(doc_hits[0].chunk.document_id, bob_doc);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let index = RagIndex::open_memory().await.unwrap();
        seed_document(&index, "alice", &[[1.0, 0.0]]).await;

        let service = SemanticSearchService::new(index, Arc::new(FailingQueryProvider));
        let hits = service.search("q", &SearchOptions::default()).await;

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_logged() {
        let index = RagIndex::open_memory().await.unwrap();
        seed_document(&index, "alice", &[[1.0, 0.0], [0.9, 0.1]]).await;

        let service = service(&index, vec![1.0, 0.0]);
        let hits = service
            .search(
                "quarterly revenue",
                &SearchOptions {
                    similarity_threshold: 0.0,
                    user: Some("alice".to_string()),
                    ..SearchOptions::default()
                },
            )
            .await;
        assert_eq!(hits.len(), 2);

        let stats = service.index.stats().await.unwrap();
        assert_eq!(stats.search_queries_count, 1);
    }

    #[tokio::test]
    async fn test_log_query_false_skips_logging() {
        let index = RagIndex::open_memory().await.unwrap();
        seed_document(&index, "alice", &[[1.0, 0.0]]).await;

        let service = service(&index, vec![1.0, 0.0]);
        service
            .search(
                "q",
                &SearchOptions {
                    log_query: false,
                    ..SearchOptions::default()
                },
            )
            .await;

        let stats = service.index.stats().await.unwrap();
        assert_eq!(stats.search_queries_count, 0);
    }

    #[tokio::test]
    async fn test_similar_chunks_excludes_same_document() {
        let index = RagIndex::open_memory().await.unwrap();
        let doc_a = seed_document(&index, "alice", &[[1.0, 0.0], [0.9, 0.1]]).await;
        let doc_b = seed_document(&index, "bob", &[[0.95, 0.05]]).await;

        let seed_chunk = index.chunks_for_document(doc_a).await.unwrap()[0]
            .id
            .unwrap();

        let service = service(&index, vec![1.0, 0.0]);

        let hits = service.similar_chunks(seed_chunk, 5, true).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, doc_b);
        assert_eq!(hits[0].rank, 1);

        // Without the exclusion the sibling chunk is a candidate too, but
        // the seed chunk itself never is
        let hits = service.similar_chunks(seed_chunk, 5, false).await;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.chunk.id != Some(seed_chunk)));
    }

    #[tokio::test]
    async fn test_similar_chunks_without_embedding_is_empty() {
        let index = RagIndex::open_memory().await.unwrap();
        let document = Document::new(
            "alice",
            "r.txt",
            "/tmp/r.txt",
            "other",
            64,
            ProcessingMode::Manual,
        );
        let id = index.insert_document(&document).await.unwrap();
        index
            .replace_chunks(
                id,
                &[ChunkRecord {
                    id: None,
                    document_id: id,
                    chunk_index: 0,
                    content: "no vector".to_string(),
                    embedding: None,
                    token_count: 2,
                    char_count: 9,
                }],
            )
            .await
            .unwrap();
        let chunk_id = index.chunks_for_document(id).await.unwrap()[0].id.unwrap();

        let service = service(&index, vec![1.0, 0.0]);
        assert!(service.similar_chunks(chunk_id, 5, true).await.is_empty());
    }
}
