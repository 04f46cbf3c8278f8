//! Per-image classification pipeline.
//!
//! - **guard**: reject raw sensor suffixes before any I/O
//! - **loader**: read and decode images under size and time limits
//! - **classifier**: encoders plus the shared tag pool, one image at a time
//! - **driver**: ordered batch processing with per-item failure isolation

pub mod classifier;
pub mod driver;
pub mod guard;
pub mod loader;

pub use classifier::{build_pool, load_pool_encoder, CaptionBackend, Classifier, QueryBackend};
pub use driver::{classify_batch, BatchOptions, BatchReport, BatchSummary};
pub use guard::FormatGuard;
pub use loader::{ImageLoader, LoadedImage};
