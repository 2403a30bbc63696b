//! This module splits extracted document text into overlapping chunks sized
//! for embedding and retrieval in a RAG (Retrieval Augmented Generation)
//! system.
//!
//! The splitting strategy works at two granularities:
//!
//! 1. Paragraphs are accumulated into a running buffer until appending the
//!    next one would exceed the target chunk size.
//! 2. A paragraph that alone exceeds the target size is split into sentences
//!    and the same accumulation logic is applied at sentence granularity.
//!    A single sentence that still exceeds the target is accepted as one
//!    hard chunk.
//!
//! When a buffer is closed, an overlap snippet is taken from its trailing
//! characters (trimmed to a sentence boundary) and seeded into the next
//! buffer, so consecutive chunks share context instead of cutting mid-word.
//!
//! # Usage
//!
//! ```
//! use quarry_chunk::Chunker;
//!
//! let chunker = Chunker::new(2000, 200, 10);
//! let chunks = chunker.chunk("First paragraph of a report.\n\nSecond paragraph.");
//!
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].index, 0);
//! assert_eq!(chunks[0].token_count, chunks[0].char_count / 4);
//! ```
//!
//! # Lossy trailing-buffer policy
//!
//! A final buffer shorter than `min_chunk_size` is silently dropped rather
//! than emitted. This is deliberate: tiny trailing chunks are usually
//! near-duplicates of the preceding overlap and degrade retrieval quality.
//! Callers that need byte-exact coverage should lower `min_chunk_size`.

use regex::Regex;
use serde::Serialize;

/// A bounded segment of a document's text, the unit of embedding and
/// retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// The text content of this chunk.
    pub content: String,
    /// Zero-based position of this chunk within the document.
    pub index: usize,
    /// Approximate token count (`char_count / 4`).
    pub token_count: usize,
    /// Number of characters in `content`.
    pub char_count: usize,
}

/// Splits document text into overlapping chunks.
///
/// The three size parameters are measured in characters:
///
/// * `chunk_size` — target size of each chunk (default 2000)
/// * `chunk_overlap` — trailing window seeded into the next chunk (default 200)
/// * `min_chunk_size` — buffers below this are never emitted (default 100)
///
/// Chunking is a pure function of the input text and these parameters:
/// the same input always yields the same chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
    paragraph_re: Regex,
    whitespace_re: Regex,
    sentence_re: Regex,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(2000, 200, 100)
    }
}

impl Chunker {
    /// Create a chunker with explicit size parameters.
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
            // Two or more newlines (with any interleaved horizontal
            // whitespace) mark a paragraph break; longer runs collapse to
            // the same single break.
            paragraph_re: Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap(),
            whitespace_re: Regex::new(r"\s+").unwrap(),
            // Terminal punctuation followed by whitespace ends a sentence.
            // The regex crate has no look-behind, so the cut point is
            // computed from the match range instead (see split_sentences).
            sentence_re: Regex::new(r"[.!?]+\s+").unwrap(),
        }
    }

    /// Target chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap window in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Minimum emitted chunk size in characters.
    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    /// Split `text` into ordered chunks.
    ///
    /// Empty or whitespace-only input yields no chunks. Chunk indices are
    /// contiguous from 0 in the order the chunks appear in the text.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let char_count = content.chars().count();
                Chunk {
                    index,
                    token_count: char_count / 4,
                    char_count,
                    content,
                }
            })
            .collect()
    }

    /// Normalize `text` into whitespace-collapsed paragraphs.
    ///
    /// Runs of whitespace inside a paragraph collapse to a single space;
    /// runs of two or more newlines are paragraph breaks.
    fn split_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_re
            .split(text)
            .map(|p| self.whitespace_re.replace_all(p.trim(), " ").into_owned())
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in self.split_paragraphs(text) {
            if char_len(&current) + char_len(&paragraph) > self.chunk_size {
                if !current.is_empty() && char_len(&paragraph) <= self.chunk_size {
                    // Close the buffer and seed the next one with overlap.
                    self.close_buffer(&mut chunks, &mut current, paragraph);
                } else {
                    // The paragraph alone exceeds the target size: fall back
                    // to sentence granularity with the same buffer logic.
                    for sentence in self.split_sentences(&paragraph) {
                        if char_len(&current) + char_len(&sentence) > self.chunk_size {
                            if !current.is_empty() {
                                self.close_buffer(&mut chunks, &mut current, sentence);
                            } else {
                                // A single oversized sentence becomes one
                                // hard chunk without further splitting.
                                current = sentence;
                            }
                        } else {
                            push_with_separator(&mut current, &sentence, " ");
                        }
                    }
                }
            } else {
                push_with_separator(&mut current, &paragraph, "\n\n");
            }
        }

        // Trailing buffer: emitted only if it meets the minimum size.
        if char_len(current.trim()) >= self.min_chunk_size {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Push `current` as a chunk (if large enough) and start a fresh buffer
    /// seeded with the overlap snippet followed by `next`.
    fn close_buffer(&self, chunks: &mut Vec<String>, current: &mut String, next: String) {
        let closed = current.trim().to_string();
        let overlap = self.overlap_tail(&closed);
        if char_len(&closed) >= self.min_chunk_size {
            chunks.push(closed);
        }
        *current = if overlap.is_empty() {
            next
        } else {
            format!("{overlap} {next}")
        };
    }

    /// Split text into sentences on terminal punctuation.
    ///
    /// The punctuation stays attached to the sentence it terminates.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for mat in self.sentence_re.find_iter(text) {
            // The match covers the punctuation run plus trailing whitespace;
            // the sentence ends after the punctuation.
            let punct_len = text[mat.range()].trim_end().len();
            let sentence = text[start..mat.start() + punct_len].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = mat.end();
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }

    /// Compute the overlap snippet from the end of a closed chunk.
    ///
    /// Takes the trailing `chunk_overlap` characters and trims them to the
    /// nearest sentence boundary, so the next chunk starts mid-context
    /// rather than mid-word.
    fn overlap_tail(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_overlap {
            return text.trim().to_string();
        }

        let window: String = chars[chars.len() - self.chunk_overlap..].iter().collect();
        let sentences = self.split_sentences(&window);

        match sentences.len() {
            0 => window.trim().to_string(),
            // The first entry is usually a partial sentence cut by the
            // window edge; keep the last complete sentence or two.
            1 => sentences.into_iter().next_back().unwrap_or_default(),
            n => sentences[n - 2..].join(" "),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_with_separator(buffer: &mut String, piece: &str, separator: &str) {
    if !buffer.is_empty() {
        buffer.push_str(separator);
    }
    buffer.push_str(piece);
}
