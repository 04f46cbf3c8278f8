//! Flat brute-force scoring of a query embedding against the tag pool.
//!
//! Both the query and the pool rows are unit vectors, so each dot product is
//! the cosine similarity.

use crate::error::ConfigError;
use crate::types::ScoreVector;

use super::pool::TagPool;

/// Score a query embedding against every tag in the pool.
///
/// The result is aligned to pool order. A dimension mismatch means the pool
/// and the query encoder come from different model families.
pub fn score(query: &[f32], pool: &TagPool) -> Result<ScoreVector, ConfigError> {
    let dim = pool.embedding_dim();
    if query.len() != dim {
        return Err(ConfigError::DimensionMismatch {
            pool: dim,
            query: query.len(),
        });
    }

    let scores = pool
        .rows()
        .map(|row| crate::math::dot(query, row))
        .collect();

    Ok(ScoreVector::new(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::l2_normalize;
    use crate::tagging::pool::TagEntry;

    fn pool() -> TagPool {
        TagPool::from_embeddings(
            vec![
                TagEntry::new("Cat", "cat"),
                TagEntry::new("Dog", "dog"),
                TagEntry::new("Car", "car"),
            ],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.6, 0.8, 0.0],
                vec![-1.0, 0.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_identical_embedding_scores_one() {
        let scores = score(&[1.0, 0.0, 0.0], &pool()).unwrap();
        assert!((scores.as_slice()[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scores_aligned_to_pool_order() {
        let scores = score(&[1.0, 0.0, 0.0], &pool()).unwrap();
        assert_eq!(scores.len(), 3);
        assert!((scores.as_slice()[1] - 0.6).abs() < 1e-6);
        assert!((scores.as_slice()[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scores_within_unit_range() {
        let query = l2_normalize(&[0.3, -0.9, 0.4]);
        let scores = score(&query, &pool()).unwrap();
        for s in scores.as_slice() {
            assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(s), "score {s} out of range");
        }
    }

    #[test]
    fn test_dimension_mismatch_is_config_error() {
        let err = score(&[1.0, 0.0], &pool()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DimensionMismatch { pool: 3, query: 2 }
        ));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let query = l2_normalize(&[0.1, 0.2, 0.3]);
        let a = score(&query, &pool()).unwrap();
        let b = score(&query, &pool()).unwrap();
        assert_eq!(a, b);
    }
}
