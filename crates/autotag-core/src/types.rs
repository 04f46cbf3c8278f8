//! Core data types flowing through the classifier.
//!
//! Queries and score vectors are transient and owned by a single
//! classification call; `ClassificationResult` is what the batch driver emits.

use serde::{Deserialize, Serialize};

use crate::error::SkipReason;

/// A single tag chosen for an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMatch {
    /// The tag label as declared in the pool (e.g. "Landscape")
    pub label: String,

    /// Cosine similarity between the query and the tag embedding
    pub score: f32,
}

impl TagMatch {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// The tags chosen for one input path.
///
/// `tags` may be empty: either no tag cleared the threshold, or the image was
/// skipped. The two cases are told apart only in logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The path exactly as given in the input list
    pub image_path: String,

    /// Selected tags, best first
    pub tags: Vec<TagMatch>,
}

impl ClassificationResult {
    /// An empty result for a skipped image.
    pub fn empty(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            tags: Vec::new(),
        }
    }
}

/// Outcome of classifying a single image.
pub type ItemOutcome = std::result::Result<ClassificationResult, SkipReason>;

/// An image reference with its query embedding, if one could be produced.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    pub path: String,
    pub embedding: Option<Vec<f32>>,
}

/// Cosine scores aligned to pool order: `scores[i]` belongs to pool entry `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices ordered by descending score, ties by ascending index.
    pub fn ranked_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.0.len()).collect();
        // NaN sorts last so a broken score can never outrank a real one.
        indices.sort_by(|&a, &b| {
            let (sa, sb) = (self.0[a], self.0[b]);
            match (sa.is_nan(), sb.is_nan()) {
                (true, true) => a.cmp(&b),
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => sb.total_cmp(&sa).then(a.cmp(&b)),
            }
        });
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_indices_descending() {
        let scores = ScoreVector::new(vec![0.1, 0.9, 0.5]);
        assert_eq!(scores.ranked_indices(), vec![1, 2, 0]);
    }

    #[test]
    fn test_ranked_indices_ties_prefer_lower_index() {
        let scores = ScoreVector::new(vec![0.3, 0.7, 0.7, 0.3]);
        assert_eq!(scores.ranked_indices(), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_ranked_indices_nan_last() {
        let scores = ScoreVector::new(vec![f32::NAN, -0.5, 0.2]);
        assert_eq!(scores.ranked_indices(), vec![2, 1, 0]);
    }

    #[test]
    fn test_empty_result() {
        let result = ClassificationResult::empty("b.raf");
        assert_eq!(result.image_path, "b.raf");
        assert!(result.tags.is_empty());
    }
}
