//! Text extraction collaborator contract.
//!
//! The pipeline does not render file formats itself: it hands a document's
//! byte content to a [`TextExtractor`] and fails the processing attempt if
//! no text comes back. The in-tree [`PlainTextExtractor`] covers plain-text
//! uploads; PDF or OCR extractors implement the same trait outside this
//! crate.

use anyhow::Result;
use async_trait::async_trait;

/// Turns a document's raw byte content into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from `content`.
    ///
    /// An `Err` or an empty/whitespace-only result fails the processing
    /// attempt (retryable).
    async fn extract(&self, content: &[u8]) -> Result<String>;
}

/// Extractor for documents that already are plain text.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; a scanned PDF
/// handed to this extractor surfaces as "no text extracted" downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(content).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text_passthrough() {
        let extractor = PlainTextExtractor;
        let text = extractor.extract("hello world".as_bytes()).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let extractor = PlainTextExtractor;
        let text = extractor.extract(&[0x68, 0x69, 0xFF]).await.unwrap();
        assert!(text.starts_with("hi"));
    }
}
