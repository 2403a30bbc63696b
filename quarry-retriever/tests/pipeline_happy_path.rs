//! Integration tests focusing on happy path scenarios for the document
//! pipeline:
//! - Creating and configuring the ProcessingEngine
//! - Ingesting documents through the creation entry point
//! - Queued vs inline dispatch
//! - Semantic search over processed documents

use anyhow::Result;
use async_trait::async_trait;
use quarry_embed::EmbeddingProvider;
use quarry_retriever::pipeline::{
    Dispatch, NewDocument, ProcessingConfig, ProcessingEngine, ProcessingJob, ProcessingMode,
    ProcessingStatus,
};
use quarry_retriever::search::{SearchOptions, SemanticSearchService};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Deterministic bag-of-words embedding: texts sharing vocabulary get
/// similar vectors, which is enough to exercise ranking end to end.
struct HashedBagProvider {
    dimension: usize,
}

impl HashedBagProvider {
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedBagProvider {
    async fn embed_texts(&self, texts: &[String]) -> quarry_embed::Result<Vec<Option<Vec<f32>>>> {
        Ok(texts.iter().map(|t| Some(self.vector_for(t))).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashed-bag"
    }
}

async fn write_document(dir: &Path, name: &str, sentences: &[&str]) -> String {
    let text = sentences
        .iter()
        .map(|s| s.repeat(3))
        .collect::<Vec<_>>()
        .join("\n\n");
    let path = dir.join(name);
    tokio::fs::write(&path, text).await.unwrap();
    path.to_string_lossy().to_string()
}

fn upload(owner: &str, file_path: &str, doc_type: &str) -> NewDocument {
    NewDocument {
        owner: owner.to_string(),
        filename: Path::new(file_path)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned(),
        file_path: file_path.to_string(),
        doc_type: doc_type.to_string(),
        size_bytes: 1024,
        mode: None,
    }
}

fn test_engine_config() -> ProcessingConfig {
    // Small chunks so a few sentences produce several of them
    ProcessingConfig::default().with_chunking(200, 40, 20)
}

#[tokio::test]
async fn test_ingest_process_search_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let provider = Arc::new(HashedBagProvider { dimension: 16 });

    let engine = ProcessingEngine::new_memory(test_engine_config())
        .await?
        .with_provider(provider.clone())
        .with_dispatch(Dispatch::Inline);

    let revenue_path = write_document(
        dir.path(),
        "revenue.txt",
        &["Quarterly revenue grew across all product lines this year. "],
    )
    .await;
    let staffing_path = write_document(
        dir.path(),
        "staffing.txt",
        &["Headcount and staffing levels remained stable this quarter. "],
    )
    .await;

    let revenue_doc = engine
        .on_document_created(upload("alice", &revenue_path, "income_statement"))
        .await?;
    let staffing_doc = engine
        .on_document_created(upload("alice", &staffing_path, "income_statement"))
        .await?;

    assert_eq!(revenue_doc.status, ProcessingStatus::Completed);
    assert_eq!(staffing_doc.status, ProcessingStatus::Completed);

    // Every chunk carries a vector after successful processing
    let index = engine.index();
    for id in [revenue_doc.id.unwrap(), staffing_doc.id.unwrap()] {
        let chunks = index.chunks_for_document(id).await?;
        assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(chunk.embedding.is_some());
        }
    }

    // A query built from one document's vocabulary ranks that document first
    let service = SemanticSearchService::new(index.clone(), provider);
    let hits = service
        .search(
            "Quarterly revenue grew across all product lines this year.",
            &SearchOptions {
                similarity_threshold: 0.5,
                ..SearchOptions::default()
            },
        )
        .await;

    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.document_id, revenue_doc.id.unwrap());
    for (i, hit) in hits.iter().enumerate() {
        assert_eq!(hit.rank, i + 1);
        assert!(hit.score >= 0.5);
    }

    // The search landed in the analytics log
    let stats = index.stats().await?;
    assert_eq!(stats.search_queries_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_queued_dispatch_processes_on_drain() -> Result<()> {
    let dir = tempdir()?;
    let engine = ProcessingEngine::new_memory(test_engine_config())
        .await?
        .with_dispatch(Dispatch::queued());

    let path = write_document(
        dir.path(),
        "report.txt",
        &["Operating costs were flat across the reporting period. "],
    )
    .await;

    let document = engine
        .on_document_created(upload("bob", &path, "balance_sheet"))
        .await?;
    let id = document.id.unwrap();

    // Nothing ran yet: the job is waiting in the queue
    assert_eq!(document.status, ProcessingStatus::Pending);

    engine.process_pending_jobs().await?;

    let refreshed = engine.index().get_document(id).await?.unwrap();
    assert_eq!(refreshed.status, ProcessingStatus::Completed);
    assert!(!engine.index().chunks_for_document(id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_batch_documents_complete_via_sweep() -> Result<()> {
    let dir = tempdir()?;
    let engine = ProcessingEngine::new_memory(test_engine_config())
        .await?
        .with_dispatch(Dispatch::Inline);

    let mut ids = Vec::new();
    for i in 0..3 {
        let path = write_document(
            dir.path(),
            &format!("batch{i}.txt"),
            &["Cash flow statements list inflows and outflows in order. "],
        )
        .await;
        let document = engine
            .on_document_created(upload("carol", &path, "cashflow"))
            .await?;
        assert_eq!(document.mode, ProcessingMode::Batch);
        assert_eq!(document.status, ProcessingStatus::Pending);
        ids.push(document.id.unwrap());
    }

    let summary = engine.run_batch_sweep().await?;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    for id in ids {
        let document = engine.index().get_document(id).await?.unwrap();
        assert_eq!(document.status, ProcessingStatus::Completed);
        assert!(document.processed_at.is_some());
    }

    // A second sweep finds nothing left to do
    let summary = engine.run_batch_sweep().await?;
    assert_eq!(summary.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_reprocessing_replaces_chunks_cleanly() -> Result<()> {
    let dir = tempdir()?;
    let engine = ProcessingEngine::new_memory(test_engine_config())
        .await?
        .with_dispatch(Dispatch::Inline);

    let path = write_document(
        dir.path(),
        "mutable.txt",
        &["The original draft of the annual report, full of placeholder text. "],
    )
    .await;

    let document = engine
        .on_document_created(upload("dave", &path, "income_statement"))
        .await?;
    let id = document.id.unwrap();
    let before = engine.index().chunks_for_document(id).await?;
    assert!(!before.is_empty());

    // Shrink the source and reprocess: the chunk set is fully replaced
    tokio::fs::write(&path, "A short corrected final version of the annual report text.").await?;
    let outcome = engine.process_document(&ProcessingJob::new(id)).await;
    assert!(outcome.success);

    let after = engine.index().chunks_for_document(id).await?;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].chunk_index, 0);
    assert!(after[0].content.contains("corrected final version"));

    Ok(())
}
