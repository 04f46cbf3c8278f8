//! Embedding-based tag matching.
//!
//! A query embedding (from an image, or from a caption of the image) is scored
//! against every tag in a pre-encoded pool by dot product, and a ranking policy
//! picks the tags to report.

pub mod policy;
pub mod pool;
pub mod presets;
pub mod scorer;

pub use policy::{PolicyConfig, RankingPolicy};
pub use pool::{TagEntry, TagPool};
pub use scorer::score;
