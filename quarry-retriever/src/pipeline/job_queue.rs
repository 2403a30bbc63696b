//! Background job queue for document processing.
//!
//! Processing work is expressed as [`ProcessingJob`] units submitted to a
//! [`JobQueue`] and drained by the engine. Whether submission actually
//! defers work is decided by the injected [`Dispatch`] strategy: `Queued`
//! hands jobs to the flume-backed queue for a later drain, `Inline` runs the
//! job body synchronously at the call site (for environments without a
//! background runner).

use anyhow::Result;
use flume::{Receiver, Sender};
use tracing::{debug, warn};

use crate::storage::DocumentId;

/// One unit of processing work: a single attempt for a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingJob {
    pub document_id: DocumentId,
    /// 1-based attempt number; incremented by the auto-retry path.
    pub attempt: u32,
    /// Chunk without generating embeddings.
    pub skip_embeddings: bool,
}

impl ProcessingJob {
    /// Create a first-attempt job for a document.
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            attempt: 1,
            skip_embeddings: false,
        }
    }

    /// Create a chunk-only job that skips embedding generation.
    pub fn without_embeddings(document_id: DocumentId) -> Self {
        Self {
            skip_embeddings: true,
            ..Self::new(document_id)
        }
    }

    /// The follow-up job submitted by the auto-retry path.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Description of the job for logging.
    pub fn description(&self) -> String {
        format!(
            "process document {} (attempt {})",
            self.document_id, self.attempt
        )
    }
}

/// Unbounded channel of processing jobs with a soft size cap.
pub struct JobQueue {
    sender: Sender<ProcessingJob>,
    receiver: Receiver<ProcessingJob>,
    max_queue_size: usize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl JobQueue {
    /// Create a queue that refuses submissions beyond `max_queue_size`
    /// undrained jobs.
    pub fn new(max_queue_size: usize) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            max_queue_size,
        }
    }

    /// Submit a job to the queue.
    pub fn submit(&self, job: ProcessingJob) -> Result<()> {
        if self.receiver.len() >= self.max_queue_size {
            warn!("job queue is full, dropping job: {}", job.description());
            anyhow::bail!("job queue is full");
        }

        debug!("submitting job: {}", job.description());
        self.sender
            .send(job)
            .map_err(|e| anyhow::anyhow!("failed to submit job: {e}"))
    }

    /// Take the next job, if any is waiting.
    pub fn try_recv(&self) -> Option<ProcessingJob> {
        self.receiver.try_recv().ok()
    }

    /// Number of undrained jobs.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// A sender handle for delayed re-submission from spawned tasks.
    pub fn sender(&self) -> Sender<ProcessingJob> {
        self.sender.clone()
    }
}

/// How processing work is dispatched when a document is created or retried.
pub enum Dispatch {
    /// Submit to the job queue; a worker drains it later.
    Queued(JobQueue),
    /// Run the job body synchronously at the submission site.
    Inline,
}

impl Dispatch {
    /// A queued dispatcher with the default queue cap.
    pub fn queued() -> Self {
        Self::Queued(JobQueue::default())
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Dispatch::Inline)
    }

    /// The queue behind this dispatcher, if any.
    pub fn queue(&self) -> Option<&JobQueue> {
        match self {
            Dispatch::Queued(queue) => Some(queue),
            Dispatch::Inline => None,
        }
    }
}
