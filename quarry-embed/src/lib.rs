//! # quarry-embed
//!
//! A batched client for remote text-embedding providers, with retry/backoff
//! resilience. Designed for async operation behind a provider trait so other
//! backends can be swapped in.
//!
//! ## Features
//!
//! - **Order-preserving batches**: inputs are grouped into configurable
//!   batches, each sent as one API call; results come back one slot per
//!   input, in input order
//! - **Partial-failure contract**: a batch that exhausts its retries resolves
//!   to absent vectors for its slots instead of failing the whole request, so
//!   callers decide whether partial success is acceptable
//! - **Retry with linear backoff**: transient provider failures (rate limits,
//!   server errors, transport errors) are retried with linearly increasing
//!   delay
//! - **Fixed dimensionality**: each model has a known vector dimension
//!   (1536 for `text-embedding-3-small`) validated against every response
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry_embed::{EmbedConfig, EmbeddingProvider, RemoteEmbeddingProvider};
//!
//! # async fn example() -> quarry_embed::Result<()> {
//! let provider = RemoteEmbeddingProvider::new(EmbedConfig::from_env())?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let results = provider.embed_texts(&texts).await?;
//!
//! for (text, vector) in texts.iter().zip(&results) {
//!     match vector {
//!         Some(v) => println!("{text}: {} dimensions", v.len()),
//!         None => println!("{text}: embedding failed"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! Batch-level failures do not surface as errors from `embed_texts` — they
//! appear as `None` slots — while configuration and request-construction
//! problems do.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{EmbedConfig, dimension_for_model};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, RemoteEmbeddingProvider};
