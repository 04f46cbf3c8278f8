//! Ranking policies: turning a score vector into selected tags.
//!
//! All policies share one tie-break rule: equal scores resolve to the tag
//! declared first in the pool, so results never depend on sort stability.

use serde::{Deserialize, Serialize};

use crate::types::{ScoreVector, TagMatch};

use super::pool::TagPool;

/// Default number of candidates for the top-k policy.
pub const DEFAULT_TOP_K: usize = 10;

/// Default strict lower bound on kept scores for the top-k policy.
pub const DEFAULT_THRESHOLD: f32 = 0.25;

/// Which ranking strategy selects tags for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankingPolicy {
    /// Multi-label: best `top_k` tags scoring strictly above `threshold`
    #[default]
    #[serde(rename = "top-k")]
    TopKThreshold,
    /// Single-label: the one best tag, unconditionally
    #[serde(rename = "arg-max")]
    ArgMax,
    /// Arg-max over a caption embedding instead of the image embedding
    #[serde(rename = "caption")]
    CaptionMediated,
}

impl RankingPolicy {
    /// Whether the query is derived from a generated caption.
    pub fn uses_caption(self) -> bool {
        matches!(self, RankingPolicy::CaptionMediated)
    }
}

impl std::fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankingPolicy::TopKThreshold => write!(f, "top-k"),
            RankingPolicy::ArgMax => write!(f, "arg-max"),
            RankingPolicy::CaptionMediated => write!(f, "caption"),
        }
    }
}

/// A policy together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub policy: RankingPolicy,
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy: RankingPolicy::default(),
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PolicyConfig {
    pub fn from_config(tagging: &crate::config::TaggingConfig) -> Self {
        Self {
            policy: tagging.policy,
            top_k: tagging.top_k,
            threshold: tagging.threshold,
        }
    }

    /// Select tags from a score vector produced against `pool`.
    pub fn select(&self, scores: &ScoreVector, pool: &TagPool) -> Vec<TagMatch> {
        match self.policy {
            RankingPolicy::TopKThreshold => {
                top_k_threshold(scores, pool, self.top_k, self.threshold)
            }
            RankingPolicy::ArgMax | RankingPolicy::CaptionMediated => {
                arg_max(scores, pool).into_iter().collect()
            }
        }
    }
}

/// Multi-label selection.
///
/// Takes the `top_k` best indices (clamped to the pool size), then keeps those
/// scoring strictly above `threshold`. Output is best first.
pub fn top_k_threshold(
    scores: &ScoreVector,
    pool: &TagPool,
    top_k: usize,
    threshold: f32,
) -> Vec<TagMatch> {
    let values = scores.as_slice();
    scores
        .ranked_indices()
        .into_iter()
        .take(top_k.min(values.len()))
        .filter(|&i| values[i] > threshold)
        .map(|i| TagMatch::new(pool.label(i), values[i]))
        .collect()
}

/// Single-label selection: the best tag, lowest index on ties.
///
/// Returns `None` when no score is finite, which covers an empty vector.
pub fn arg_max(scores: &ScoreVector, pool: &TagPool) -> Option<TagMatch> {
    let values = scores.as_slice();
    scores
        .ranked_indices()
        .into_iter()
        .find(|&i| values[i].is_finite())
        .map(|i| TagMatch::new(pool.label(i), values[i]))
}
