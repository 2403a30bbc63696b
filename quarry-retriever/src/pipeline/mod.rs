//! Document processing pipeline: state machine, job dispatch, and the
//! collaborator contracts the orchestrator depends on.
//!
//! ## Key Components
//!
//! - **[`engine::ProcessingEngine`]**: orchestrates extract → chunk → embed → store
//! - **[`document`]**: processing status/mode enums and the mode-selection rules
//! - **[`job_queue`]**: background job queue and the dispatch strategy
//! - **[`extract`]** / **[`notify`]**: text-extraction and operator-notification seams

pub mod document;
pub mod engine;
pub mod extract;
pub mod job_queue;
pub mod notify;

pub use document::{Document, ModeRules, ProcessingMode, ProcessingStatus};
pub use engine::{
    BatchSummary, NewDocument, ProcessingConfig, ProcessingEngine, ProcessingOutcome,
    ProcessingStats,
};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use job_queue::{Dispatch, JobQueue, ProcessingJob};
pub use notify::{LogNotifier, Notifier};
