//! Document processing state and mode-selection rules.
//!
//! A [`Document`] is the pipeline's view of an uploaded file: identity,
//! owner, file handle, declared type, and the processing bookkeeping fields
//! that the orchestrator owns. Status transitions are monotonic
//! (`pending → processing → completed/failed/skipped`) except for explicit
//! operator-triggered resets of failed documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::DocumentId;

/// Processing state of a document in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    /// Not yet processed; batch-mode documents wait here for the sweep
    Pending,
    /// A processing job is (or was) running for this document
    Processing,
    /// Chunking and embedding finished successfully
    Completed,
    /// The last attempt failed; see `last_error` and `retry_count`
    Failed,
    /// Deliberately not processed
    Skipped,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
            ProcessingStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            "skipped" => Ok(ProcessingStatus::Skipped),
            _ => Err(format!(
                "Invalid processing status: '{s}'. Valid values are: pending, processing, completed, failed, skipped"
            )),
        }
    }
}

/// Policy governing when a document's chunk/embedding pipeline runs.
///
/// The mode is computed once, when the document is created, and is not
/// re-evaluated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Enqueue an asynchronous processing job right away
    Immediate,
    /// Wait for the periodic sweep over pending batch documents
    Batch,
    /// No automatic action; an operator triggers processing explicitly
    Manual,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingMode::Immediate => write!(f, "immediate"),
            ProcessingMode::Batch => write!(f, "batch"),
            ProcessingMode::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" => Ok(ProcessingMode::Immediate),
            "batch" => Ok(ProcessingMode::Batch),
            "manual" => Ok(ProcessingMode::Manual),
            _ => Err(format!(
                "Invalid processing mode: '{s}'. Valid values are: immediate, batch, manual"
            )),
        }
    }
}

/// The pipeline's record of a document handed to it by the uploading system.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Option<DocumentId>,
    /// Identity of the owning user.
    pub owner: String,
    /// Display name of the uploaded file.
    pub filename: String,
    /// File handle the byte content is read from.
    pub file_path: String,
    /// Declared document type, used by the mode rules.
    pub doc_type: String,
    /// Byte size of the uploaded content.
    pub size_bytes: u64,
    pub status: ProcessingStatus,
    pub mode: ProcessingMode,
    /// Failed attempts so far; reset to zero by operator retry.
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new unsaved document in `pending` state.
    pub fn new(
        owner: impl Into<String>,
        filename: impl Into<String>,
        file_path: impl Into<String>,
        doc_type: impl Into<String>,
        size_bytes: u64,
        mode: ProcessingMode,
    ) -> Self {
        Self {
            id: None,
            owner: owner.into(),
            filename: filename.into(),
            file_path: file_path.into(),
            doc_type: doc_type.into(),
            size_bytes,
            status: ProcessingStatus::Pending,
            mode,
            retry_count: 0,
            last_error: None,
            processed_at: None,
        }
    }
}

/// Rules deciding the processing mode for a newly created document.
///
/// Evaluated in priority order:
///
/// 1. auto-processing disabled → `manual`
/// 2. byte size above `batch_size_threshold` → `batch`
/// 3. declared type in `immediate_types` → `immediate`
/// 4. declared type in `batch_types` → `batch`
/// 5. otherwise → `immediate`
#[derive(Debug, Clone)]
pub struct ModeRules {
    pub auto_processing_enabled: bool,
    /// Files larger than this always go to batch (default 5 MB).
    pub batch_size_threshold: u64,
    /// Declared types processed immediately on upload.
    pub immediate_types: Vec<String>,
    /// Declared types deferred to the nightly sweep.
    pub batch_types: Vec<String>,
}

impl Default for ModeRules {
    fn default() -> Self {
        Self {
            auto_processing_enabled: true,
            batch_size_threshold: 5 * 1024 * 1024,
            immediate_types: vec!["income_statement".to_string(), "balance_sheet".to_string()],
            batch_types: vec![
                "other".to_string(),
                "cashflow".to_string(),
                "annual_report".to_string(),
            ],
        }
    }
}

impl ModeRules {
    /// Decide the processing mode for a document's declared type and size.
    pub fn decide(&self, doc_type: &str, size_bytes: u64) -> ProcessingMode {
        if !self.auto_processing_enabled {
            return ProcessingMode::Manual;
        }

        // Large files always go to batch, regardless of type
        if size_bytes > self.batch_size_threshold {
            return ProcessingMode::Batch;
        }

        if self.immediate_types.iter().any(|t| t == doc_type) {
            return ProcessingMode::Immediate;
        }

        if self.batch_types.iter().any(|t| t == doc_type) {
            return ProcessingMode::Batch;
        }

        ProcessingMode::Immediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
            ProcessingStatus::Skipped,
        ] {
            assert_eq!(status.to_string().parse::<ProcessingStatus>(), Ok(status));
        }

        assert!("invalid".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_mode_round_trip() {
        for mode in [
            ProcessingMode::Immediate,
            ProcessingMode::Batch,
            ProcessingMode::Manual,
        ] {
            assert_eq!(mode.to_string().parse::<ProcessingMode>(), Ok(mode));
        }

        // Case insensitive
        assert_eq!(
            "IMMEDIATE".parse::<ProcessingMode>(),
            Ok(ProcessingMode::Immediate)
        );
        assert!("eventually".parse::<ProcessingMode>().is_err());
    }

    #[test]
    fn test_small_immediate_type_is_immediate() {
        let rules = ModeRules::default();
        assert_eq!(
            rules.decide("income_statement", 1024),
            ProcessingMode::Immediate
        );
        assert_eq!(
            rules.decide("balance_sheet", 1024),
            ProcessingMode::Immediate
        );
    }

    #[test]
    fn test_large_file_is_batch_regardless_of_type() {
        let rules = ModeRules::default();
        let ten_mb = 10 * 1024 * 1024;
        assert_eq!(rules.decide("income_statement", ten_mb), ProcessingMode::Batch);
        assert_eq!(rules.decide("unknown", ten_mb), ProcessingMode::Batch);
    }

    #[test]
    fn test_batch_type_is_batch() {
        let rules = ModeRules::default();
        assert_eq!(rules.decide("cashflow", 1024), ProcessingMode::Batch);
    }

    #[test]
    fn test_unknown_small_type_defaults_to_immediate() {
        let rules = ModeRules::default();
        assert_eq!(rules.decide("memo", 1024), ProcessingMode::Immediate);
    }

    #[test]
    fn test_disabled_auto_processing_is_manual() {
        let rules = ModeRules {
            auto_processing_enabled: false,
            ..ModeRules::default()
        };
        assert_eq!(rules.decide("income_statement", 1024), ProcessingMode::Manual);
    }
}
