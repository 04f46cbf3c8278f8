//! autotag core - embedding-based photo tagging.
//!
//! Assigns descriptive tags to photographs by comparing an image embedding
//! (or the embedding of a generated caption) against a pre-encoded pool of
//! tag embeddings, then selecting tags with a ranking policy.
//!
//! # Architecture
//!
//! ```text
//! Tag pool (built once) ──┐
//!                         ▼
//! Path → Guard → Load → Encode → Score → Select → ClassificationResult
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use autotag_core::{classify_batch, BatchOptions, Classifier, Config};
//!
//! #[tokio::main]
//! async fn main() -> autotag_core::Result<()> {
//!     let config = Config::load()?;
//!     let classifier = Classifier::from_config(&config)?;
//!
//!     let paths = vec!["a.jpg".to_string(), "b.raf".to_string()];
//!     let report = classify_batch(&classifier, &paths, &BatchOptions::default(), |_, _| {}).await?;
//!     for result in &report.results {
//!         println!("{}: {:?}", result.image_path, result.tags);
//!     }
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod config;
pub mod encoder;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod tagging;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, TagFormat};
pub use error::{AutotagError, ConfigError, PipelineError, PipelineResult, Result, SkipReason};
pub use output::{OutputWriter, TagStyle};
pub use pipeline::{classify_batch, BatchOptions, BatchReport, BatchSummary, Classifier};
pub use tagging::{PolicyConfig, RankingPolicy, TagEntry, TagPool};
pub use types::{ClassificationResult, ItemOutcome, TagMatch};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
