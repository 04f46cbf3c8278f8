//! Batch driver: classify a list of paths into an ordered result list.
//!
//! Items are independent, so up to `parallel` of them run concurrently, but
//! results are always collected in input order. Per-item failures become empty
//! results; only fatal errors stop the batch.

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{Result, SkipReason};
use crate::types::{ClassificationResult, ItemOutcome};

use super::classifier::Classifier;

/// Concurrency and deadline settings for one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Items in flight at once (1 = sequential)
    pub parallel: usize,
    /// Per-item deadline in milliseconds (0 = none)
    pub item_timeout_ms: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: 1,
            item_timeout_ms: 0,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            parallel: config.processing.parallel_workers,
            item_timeout_ms: config.limits.item_timeout_ms,
        }
    }
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    /// Items with at least one tag
    pub tagged: usize,
    /// Items processed successfully that matched nothing
    pub untagged: usize,
    /// Items skipped for a recoverable reason
    pub skipped: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct BatchReport {
    /// One result per input path, in input order
    pub results: Vec<ClassificationResult>,
    pub summary: BatchSummary,
}

/// Classify every path with `classifier`.
///
/// `on_item` is called once per path, in input order, as results complete.
/// Returns exactly `paths.len()` results unless a fatal error aborts the run,
/// in which case no results are returned.
pub async fn classify_batch<F>(
    classifier: &Classifier,
    paths: &[String],
    options: &BatchOptions,
    mut on_item: F,
) -> Result<BatchReport>
where
    F: FnMut(&str, &ItemOutcome),
{
    let start = Instant::now();
    let parallel = options.parallel.max(1);
    tracing::info!(
        "Classifying {} images ({} policy, {} in flight)",
        paths.len(),
        classifier.policy().policy,
        parallel
    );

    let mut outcomes = stream::iter(
        paths
            .iter()
            .map(|path| classify_with_deadline(classifier, path, options.item_timeout_ms)),
    )
    .buffered(parallel);

    let mut results = Vec::with_capacity(paths.len());
    let mut summary = BatchSummary {
        total: paths.len(),
        ..BatchSummary::default()
    };

    while let Some(outcome) = outcomes.next().await {
        let path = &paths[results.len()];
        let outcome = outcome?;
        on_item(path, &outcome);

        let result = match outcome {
            Ok(result) => {
                if result.tags.is_empty() {
                    summary.untagged += 1;
                } else {
                    summary.tagged += 1;
                }
                result
            }
            Err(reason) => {
                tracing::warn!("Skipping {}: {}", path, reason);
                summary.skipped += 1;
                ClassificationResult::empty(path.as_str())
            }
        };
        results.push(result);
    }

    summary.elapsed = start.elapsed();
    tracing::info!(
        "Done: {} tagged, {} untagged, {} skipped in {:.1}s ({:.1} img/s)",
        summary.tagged,
        summary.untagged,
        summary.skipped,
        summary.elapsed.as_secs_f64(),
        summary.rate()
    );

    Ok(BatchReport { results, summary })
}

async fn classify_with_deadline(
    classifier: &Classifier,
    path: &str,
    timeout_ms: u64,
) -> Result<ItemOutcome> {
    if timeout_ms == 0 {
        return classifier.classify_item(path).await;
    }
    match timeout(Duration::from_millis(timeout_ms), classifier.classify_item(path)).await {
        Ok(outcome) => outcome,
        Err(_) => Ok(Err(SkipReason::Timeout(format!(
            "item deadline of {timeout_ms}ms exceeded"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pipeline::classifier::{CaptionBackend, QueryBackend};
    use crate::tagging::{PolicyConfig, RankingPolicy, TagEntry, TagPool};
    use crate::testing::{write_garbage, write_png, ColorImageEncoder, FixedCaptioner, FixedTextEncoder};
    use crate::types::TagMatch;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const PURPLE: [u8; 3] = [255, 0, 255];

    fn cat_dog_pool() -> TagPool {
        TagPool::from_embeddings(
            vec![
                TagEntry::new("Cat", "a photo of a cat"),
                TagEntry::new("Dog", "a photo of a dog"),
            ],
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]],
        )
        .unwrap()
    }

    fn color_classifier(policy: RankingPolicy) -> (Classifier, Arc<ColorImageEncoder>) {
        let encoder = Arc::new(ColorImageEncoder::new());
        let policy = PolicyConfig {
            policy,
            ..PolicyConfig::default()
        };
        let classifier =
            Classifier::new(cat_dog_pool(), policy, QueryBackend::Image(encoder.clone())).unwrap();
        (classifier, encoder)
    }

    fn no_progress(_: &str, _: &ItemOutcome) {}

    #[tokio::test]
    async fn test_unsupported_item_is_empty_and_neighbours_unaffected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_png(dir.path(), "a.jpg", RED),
            write_png(dir.path(), "b.raf", RED),
            write_png(dir.path(), "c.jpg", BLUE),
        ];
        let (classifier, encoder) = color_classifier(RankingPolicy::ArgMax);

        let report = classify_batch(&classifier, &paths, &BatchOptions::default(), no_progress)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].tags, vec![TagMatch::new("Cat", 1.0)]);
        assert_eq!(report.results[1], ClassificationResult::empty(paths[1].as_str()));
        assert_eq!(report.results[2].tags, vec![TagMatch::new("Dog", 1.0)]);
        assert_eq!(encoder.calls(), 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.tagged, 2);
    }

    #[tokio::test]
    async fn test_n_in_n_out_in_order_with_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..12 {
            let path = match i % 4 {
                0 => write_png(dir.path(), &format!("{i}.png"), RED),
                1 => write_garbage(dir.path(), &format!("{i}.jpg")),
                2 => dir.path().join(format!("{i}-missing.jpg")).to_string_lossy().into_owned(),
                _ => write_png(dir.path(), &format!("{i}.png"), BLUE),
            };
            paths.push(path);
        }
        let (classifier, _) = color_classifier(RankingPolicy::ArgMax);
        let options = BatchOptions {
            parallel: 4,
            item_timeout_ms: 0,
        };

        let mut seen = Vec::new();
        let report = classify_batch(&classifier, &paths, &options, |path, _| {
            seen.push(path.to_string())
        })
        .await
        .unwrap();

        assert_eq!(report.results.len(), paths.len());
        assert_eq!(seen, paths);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.image_path, paths[i]);
            match i % 4 {
                0 => assert_eq!(result.tags[0].label, "Cat"),
                3 => assert_eq!(result.tags[0].label, "Dog"),
                _ => assert!(result.tags.is_empty()),
            }
        }
        assert_eq!(report.summary.skipped, 6);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (classifier, _) = color_classifier(RankingPolicy::TopKThreshold);
        let report = classify_batch(&classifier, &[], &BatchOptions::default(), no_progress)
            .await
            .unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.summary.total, 0);
    }

    #[tokio::test]
    async fn test_top_k_tie_keeps_pool_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![write_png(dir.path(), "purple.png", PURPLE)];
        let (classifier, _) = color_classifier(RankingPolicy::TopKThreshold);

        let report = classify_batch(&classifier, &paths, &BatchOptions::default(), no_progress)
            .await
            .unwrap();
        let labels: Vec<&str> = report.results[0]
            .tags
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Cat", "Dog"]);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_png(dir.path(), "1.png", [200, 40, 90]),
            write_png(dir.path(), "2.png", [30, 60, 220]),
        ];
        let (classifier, _) = color_classifier(RankingPolicy::TopKThreshold);
        let options = BatchOptions::default();

        let first = classify_batch(&classifier, &paths, &options, no_progress)
            .await
            .unwrap();
        let second = classify_batch(&classifier, &paths, &options, no_progress)
            .await
            .unwrap();
        assert_eq!(first.results, second.results);
    }

    #[tokio::test]
    async fn test_item_deadline_is_skip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![write_png(dir.path(), "slow.png", RED)];
        let captioner = Arc::new(
            FixedCaptioner::new("a photo of a cat").with_delay(Duration::from_secs(5)),
        );
        let backend = QueryBackend::Caption(CaptionBackend {
            generator: captioner,
            encoder: Arc::new(FixedTextEncoder::new(vec![(
                "a photo of a cat",
                vec![1.0, 0.0, 0.0],
            )])),
            prompt: "describe".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            timeout_ms: 60_000,
        });
        let policy = PolicyConfig {
            policy: RankingPolicy::CaptionMediated,
            ..PolicyConfig::default()
        };
        let classifier = Classifier::new(cat_dog_pool(), policy, backend).unwrap();
        let options = BatchOptions {
            parallel: 1,
            item_timeout_ms: 50,
        };

        let mut reasons = Vec::new();
        let report = classify_batch(&classifier, &paths, &options, |_, outcome| {
            if let Err(reason) = outcome {
                reasons.push(reason.clone());
            }
        })
        .await
        .unwrap();

        assert!(report.results[0].tags.is_empty());
        assert!(matches!(reasons.as_slice(), [SkipReason::Timeout(_)]));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.processing.parallel_workers = 6;
        config.limits.item_timeout_ms = 2500;
        let options = BatchOptions::from_config(&config);
        assert_eq!(options.parallel, 6);
        assert_eq!(options.item_timeout_ms, 2500);
    }
}
