//! High-level processing engine that orchestrates the document pipeline.
//!
//! This module coordinates text extraction, chunking, embedding generation,
//! and storage for uploaded documents. It owns the per-document processing
//! state machine (`pending → processing → completed/failed/skipped`) and all
//! retry bookkeeping.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Document → TextExtractor → Chunker → EmbeddingProvider → RagIndex
//!    ↑                                                        ↓
//! on_document_created → Dispatch → ProcessingJob → SemanticSearchService
//! ```
//!
//! ## Triggering
//!
//! Document creation is an explicit call into [`ProcessingEngine::on_document_created`]
//! — the creating use case makes the dependency visible instead of hiding it
//! behind a save-time side effect. The decided processing mode then governs
//! what happens:
//!
//! - `immediate`: a job is dispatched right away
//! - `batch`: the document stays `pending` until [`run_batch_sweep`](ProcessingEngine::run_batch_sweep)
//! - `manual`: nothing happens until an operator acts
//!
//! ## Failure handling
//!
//! Job-level failures never propagate to the caller that enqueued the job:
//! they are recorded on the document (status, error message, retry counter)
//! and retried up to the configured maximum. A document that exhausts its
//! retries is surfaced to operators through the [`Notifier`] channel.
//! Any missing embedding fails the whole document — chunks persist without
//! vectors and the attempt is retried — rather than silently accepting
//! partial success.

use anyhow::{Context, Result};
use quarry_chunk::Chunker;
use quarry_embed::EmbeddingProvider;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::document::{Document, ModeRules, ProcessingMode, ProcessingStatus};
use super::extract::{PlainTextExtractor, TextExtractor};
use super::job_queue::{Dispatch, ProcessingJob};
use super::notify::{LogNotifier, Notifier};
use crate::storage::{ChunkRecord, DocumentId, RagIndex};

/// Configuration for the processing engine.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Minimum emitted chunk size in characters.
    pub min_chunk_size: usize,
    /// Chunks embedded (and persisted) per provider round-trip.
    pub embedding_batch_size: usize,
    /// Failed attempts before a document needs operator action.
    pub max_retries: u32,
    /// Delay before an automatic retry is re-queued.
    pub retry_delay: Duration,
    /// Rules deciding the processing mode at document creation.
    pub mode_rules: ModeRules,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            embedding_batch_size: 10,
            max_retries: 3,
            retry_delay: Duration::from_secs(300),
            mode_rules: ModeRules::default(),
        }
    }
}

impl ProcessingConfig {
    /// Set the chunking size parameters.
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self.min_chunk_size = min_chunk_size;
        self
    }

    /// Set the number of chunks embedded per provider round-trip.
    pub fn with_embedding_batch_size(mut self, embedding_batch_size: usize) -> Self {
        self.embedding_batch_size = embedding_batch_size.max(1);
        self
    }

    /// Set the maximum automatic retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before automatic retries.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the mode-selection rules.
    pub fn with_mode_rules(mut self, mode_rules: ModeRules) -> Self {
        self.mode_rules = mode_rules;
        self
    }
}

/// A document handed to the pipeline by the uploading system.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner: String,
    pub filename: String,
    pub file_path: String,
    pub doc_type: String,
    pub size_bytes: u64,
    /// Explicit mode override; decided by the mode rules when absent.
    pub mode: Option<ProcessingMode>,
}

/// Result of one processing attempt chain for a document.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub document_id: DocumentId,
    pub success: bool,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub error: Option<String>,
}

/// Counters for this engine instance's session.
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub documents_processed: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub errors: usize,
}

/// Summary of one batch sweep over pending documents.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BatchError>,
}

/// One failed document in a batch sweep.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub document_id: DocumentId,
    pub filename: String,
    pub error: String,
}

/// The engine owning the document processing state machine.
pub struct ProcessingEngine {
    config: ProcessingConfig,
    index: RagIndex,
    chunker: Chunker,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    extractor: Arc<dyn TextExtractor>,
    notifier: Arc<dyn Notifier>,
    dispatch: Dispatch,
    stats: RwLock<ProcessingStats>,
}

impl ProcessingEngine {
    /// Create an engine backed by persistent SQLite storage under `base`.
    ///
    /// Starts with no embedding provider (chunk-only processing), the
    /// plain-text extractor, log-based notifications, and queued dispatch;
    /// use the `with_*` methods to swap in real collaborators.
    pub async fn new(base: &Path, config: ProcessingConfig) -> Result<Self> {
        let index = RagIndex::open(base).await?;
        Ok(Self::from_parts(index, config))
    }

    /// Create an engine with an in-memory database, for tests.
    pub async fn new_memory(config: ProcessingConfig) -> Result<Self> {
        let index = RagIndex::open_memory().await?;
        Ok(Self::from_parts(index, config))
    }

    fn from_parts(index: RagIndex, config: ProcessingConfig) -> Self {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap, config.min_chunk_size);
        Self {
            config,
            index,
            chunker,
            provider: None,
            extractor: Arc::new(PlainTextExtractor),
            notifier: Arc::new(LogNotifier),
            dispatch: Dispatch::queued(),
            stats: RwLock::new(ProcessingStats::default()),
        }
    }

    /// Enable embedding generation through the given provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Swap the text-extraction collaborator.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Swap the operator notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Swap the job dispatch strategy.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// The underlying store, for search services and queries.
    pub fn index(&self) -> &RagIndex {
        &self.index
    }

    /// Entry point for document creation.
    ///
    /// Decides the processing mode (once — it is not re-evaluated later),
    /// persists the document in `pending` state, and triggers processing
    /// according to the mode. Returns the stored document, refreshed after
    /// any inline processing.
    pub async fn on_document_created(&self, new_document: NewDocument) -> Result<Document> {
        let mode = new_document.mode.unwrap_or_else(|| {
            self.config
                .mode_rules
                .decide(&new_document.doc_type, new_document.size_bytes)
        });

        let document = Document::new(
            new_document.owner,
            new_document.filename,
            new_document.file_path,
            new_document.doc_type,
            new_document.size_bytes,
            mode,
        );
        let id = self.index.insert_document(&document).await?;

        info!(
            document_id = id,
            filename = %document.filename,
            %mode,
            "document created"
        );

        match mode {
            ProcessingMode::Immediate => {
                self.dispatch_job(ProcessingJob::new(id)).await?;
            }
            ProcessingMode::Batch => {
                info!(document_id = id, "document scheduled for batch processing");
            }
            ProcessingMode::Manual => {
                info!(document_id = id, "manual mode, skipping automatic processing");
            }
        }

        self.index
            .get_document(id)
            .await?
            .context("document vanished after insert")
    }

    async fn dispatch_job(&self, job: ProcessingJob) -> Result<()> {
        match &self.dispatch {
            Dispatch::Queued(queue) => queue.submit(job),
            Dispatch::Inline => {
                self.process_document(&job).await;
                Ok(())
            }
        }
    }

    /// Execute a processing job for a document.
    ///
    /// Failures are caught at this boundary: they are recorded on the
    /// document and drive retry bookkeeping, never propagated. With inline
    /// dispatch, automatic retries run here in a loop; with queued dispatch
    /// a delayed retry job is re-submitted to the queue.
    pub async fn process_document(&self, job: &ProcessingJob) -> ProcessingOutcome {
        let mut job = job.clone();

        loop {
            let document = match self.index.get_document(job.document_id).await {
                Ok(Some(document)) => document,
                Ok(None) => {
                    error!(document_id = job.document_id, "document not found");
                    return failure_outcome(job.document_id, "document not found");
                }
                Err(e) => {
                    error!(document_id = job.document_id, error = %e, "failed to load document");
                    return failure_outcome(job.document_id, &e.to_string());
                }
            };

            info!(
                document_id = job.document_id,
                filename = %document.filename,
                attempt = job.attempt,
                "starting document processing"
            );

            match self.run_job(&document, job.skip_embeddings).await {
                Ok((chunks_created, embeddings_generated)) => {
                    info!(
                        document_id = job.document_id,
                        chunks_created, embeddings_generated, "document processed"
                    );

                    let mut stats = self.stats.write().await;
                    stats.documents_processed += 1;
                    stats.chunks_created += chunks_created;
                    stats.embeddings_generated += embeddings_generated;

                    return ProcessingOutcome {
                        document_id: job.document_id,
                        success: true,
                        chunks_created,
                        embeddings_generated,
                        error: None,
                    };
                }
                Err(e) => {
                    let error_text = format!("{e:#}");
                    error!(
                        document_id = job.document_id,
                        attempt = job.attempt,
                        error = %error_text,
                        "document processing failed"
                    );
                    self.stats.write().await.errors += 1;

                    let retry_count = match self
                        .index
                        .mark_document_failed(job.document_id, &error_text)
                        .await
                    {
                        Ok(retry_count) => retry_count,
                        Err(save_err) => {
                            error!(
                                document_id = job.document_id,
                                error = %save_err,
                                "failed to record processing failure"
                            );
                            return failure_outcome(job.document_id, &error_text);
                        }
                    };

                    if retry_count < self.config.max_retries {
                        match &self.dispatch {
                            Dispatch::Queued(queue) => {
                                info!(
                                    document_id = job.document_id,
                                    retry_count,
                                    delay_secs = self.config.retry_delay.as_secs(),
                                    "scheduling automatic retry"
                                );
                                let sender = queue.sender();
                                let retry_job = job.retry();
                                let delay = self.config.retry_delay;
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    if sender.send(retry_job).is_err() {
                                        warn!("job queue closed before retry could be submitted");
                                    }
                                });
                                return failure_outcome(job.document_id, &error_text);
                            }
                            Dispatch::Inline => {
                                // Re-enter processing directly, without
                                // revisiting the pending state
                                job = job.retry();
                                continue;
                            }
                        }
                    }

                    self.notify_failure(&document, &error_text, retry_count).await;
                    return failure_outcome(job.document_id, &error_text);
                }
            }
        }
    }

    /// One processing attempt: extract → chunk → replace chunks → embed.
    async fn run_job(&self, document: &Document, skip_embeddings: bool) -> Result<(usize, usize)> {
        let id = document.id.context("document has no id")?;

        self.index
            .set_document_status(id, ProcessingStatus::Processing)
            .await?;

        let content = tokio::fs::read(&document.file_path)
            .await
            .with_context(|| format!("failed to read document file {}", document.file_path))?;

        let text = self
            .extractor
            .extract(&content)
            .await
            .context("text extraction failed")?;

        if text.trim().is_empty() {
            anyhow::bail!("no text extracted from document");
        }

        let records: Vec<ChunkRecord> = self
            .chunker
            .chunk(&text)
            .into_iter()
            .map(|chunk| ChunkRecord {
                id: None,
                document_id: id,
                chunk_index: chunk.index,
                content: chunk.content,
                embedding: None,
                token_count: chunk.token_count,
                char_count: chunk.char_count,
            })
            .collect();

        // Full replacement: reprocessing can never leave duplicate or
        // orphaned chunks behind
        self.index.replace_chunks(id, &records).await?;
        debug!(document_id = id, "stored {} chunks", records.len());

        let mut embeddings_generated = 0;
        if !skip_embeddings {
            if let Some(provider) = &self.provider {
                embeddings_generated = self.embed_chunks(id, &records, provider.as_ref()).await?;
            }
        }

        self.index.mark_document_completed(id).await?;

        Ok((records.len(), embeddings_generated))
    }

    /// Embed chunk contents batch by batch, persisting each vector as it
    /// arrives so partial progress survives a crash mid-batch.
    ///
    /// Any missing embedding fails the whole document.
    async fn embed_chunks(
        &self,
        document_id: DocumentId,
        records: &[ChunkRecord],
        provider: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        let dimension = provider.dimension();
        let mut generated = 0;

        for batch in records.chunks(self.config.embedding_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            debug!(document_id, "embedding batch of {} chunks", texts.len());

            let vectors = provider
                .embed_texts(&texts)
                .await
                .map_err(|e| anyhow::anyhow!("embedding request failed: {e}"))?;

            for (record, vector) in batch.iter().zip(vectors) {
                match vector {
                    Some(vector) => {
                        if vector.len() != dimension {
                            anyhow::bail!(
                                "embedding dimension mismatch for chunk {}: expected {dimension}, got {}",
                                record.chunk_index,
                                vector.len()
                            );
                        }
                        self.index
                            .set_chunk_embedding(document_id, record.chunk_index, &vector)
                            .await?;
                        generated += 1;
                    }
                    None => {
                        anyhow::bail!(
                            "embedding generation failed for chunk {}",
                            record.chunk_index
                        );
                    }
                }
            }
        }

        Ok(generated)
    }

    /// Drain pending jobs from the queue.
    ///
    /// Jobs are processed sequentially up to a safety limit per call.
    /// A no-op under inline dispatch.
    pub async fn process_pending_jobs(&self) -> Result<()> {
        let Some(queue) = self.dispatch.queue() else {
            return Ok(());
        };

        let max_jobs_per_drain = 100;
        let mut jobs_processed = 0;

        while let Some(job) = queue.try_recv() {
            let outcome = self.process_document(&job).await;
            debug!(
                document_id = outcome.document_id,
                success = outcome.success,
                "completed job: {}",
                job.description()
            );

            jobs_processed += 1;
            if jobs_processed >= max_jobs_per_drain {
                debug!("reached max jobs per drain ({max_jobs_per_drain}), stopping");
                break;
            }
        }

        debug!("processed {jobs_processed} jobs in this drain");
        Ok(())
    }

    /// Periodic sweep over all `pending` documents in `batch` mode.
    ///
    /// Documents are processed sequentially; a single summary notification
    /// is sent if any of them failed.
    pub async fn run_batch_sweep(&self) -> Result<BatchSummary> {
        let documents = self.index.pending_batch_documents().await?;
        info!("batch sweep: {} pending documents", documents.len());

        let mut summary = BatchSummary {
            total: documents.len(),
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        };

        for document in documents {
            let Some(id) = document.id else { continue };
            let outcome = self.process_document(&ProcessingJob::new(id)).await;

            if outcome.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.errors.push(BatchError {
                    document_id: id,
                    filename: document.filename.clone(),
                    error: outcome.error.unwrap_or_default(),
                });
            }
        }

        info!(
            "batch sweep completed: {}/{} successful, {} failed",
            summary.succeeded, summary.total, summary.failed
        );

        if summary.failed > 0 {
            self.notify_batch_summary(&summary).await;
        }

        Ok(summary)
    }

    /// Operator action: reset all failed documents to `pending` with a
    /// zeroed retry counter and re-dispatch them. Returns the affected IDs.
    pub async fn retry_failed(&self) -> Result<Vec<DocumentId>> {
        let ids = self.index.reset_failed_documents().await?;
        info!("operator retry: re-queueing {} failed documents", ids.len());

        for &id in &ids {
            self.dispatch_job(ProcessingJob::new(id)).await?;
        }

        Ok(ids)
    }

    /// Counters for this engine instance's session.
    pub async fn stats(&self) -> ProcessingStats {
        self.stats.read().await.clone()
    }

    async fn notify_failure(&self, document: &Document, error: &str, retry_count: u32) {
        let subject = format!("Document processing failed: {}", document.filename);
        let body = format!(
            "Document processing failed and retries are exhausted:\n\n\
             Document ID: {}\n\
             Filename: {}\n\
             Owner: {}\n\
             Retry count: {}\n\n\
             Error:\n{}\n\n\
             Please investigate and retry if necessary.\n",
            document.id.unwrap_or_default(),
            document.filename,
            document.owner,
            retry_count,
            error,
        );
        self.notifier.notify(&subject, &body).await;
    }

    async fn notify_batch_summary(&self, summary: &BatchSummary) {
        let subject = format!("Batch processing summary: {} failures", summary.failed);
        let errors_text: String = summary
            .errors
            .iter()
            .map(|e| format!("- Document {} ({}): {}\n", e.document_id, e.filename, e.error))
            .collect();
        let body = format!(
            "Batch document processing completed with errors:\n\n\
             Total documents: {}\n\
             Successful: {}\n\
             Failed: {}\n\n\
             Failed documents:\n{}",
            summary.total, summary.succeeded, summary.failed, errors_text,
        );
        self.notifier.notify(&subject, &body).await;
    }
}

fn failure_outcome(document_id: DocumentId, error: &str) -> ProcessingOutcome {
    ProcessingOutcome {
        document_id,
        success: false,
        chunks_created: 0,
        embeddings_generated: 0,
        error: Some(error.to_string()),
    }
}
