//! Default command: classify a JSON list of image paths.

use std::fs::File;
use std::io::{BufWriter, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use autotag_core::{classify_batch, BatchOptions, Classifier, Config, OutputWriter, TagStyle};
use clap::Args;

use super::types::{PolicyArg, TagFormatArg};

/// Arguments for classifying a batch.
#[derive(Args, Debug, Default)]
pub struct ClassifyArgs {
    /// JSON file holding an array of image paths ("-" reads stdin)
    ///
    /// A file named like a subcommand must be written as "./config" or
    /// passed after "--", e.g. `autotag -- pool`.
    #[arg(required = true)]
    pub input: Option<PathBuf>,

    /// Maximum tags per image (top-k policy)
    #[arg(value_parser = parse_top_k)]
    pub top_k: Option<usize>,

    /// Keep only tags scoring strictly above this (top-k policy)
    #[arg(value_parser = parse_threshold, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    /// Ranking policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Tag pool: preset name (photography, scenes, styles) or TOML file
    #[arg(long)]
    pub pool: Option<String>,

    /// How tags are rendered in the output
    #[arg(long, value_enum)]
    pub tag_format: Option<TagFormatArg>,

    /// Images processed concurrently
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

fn parse_top_k(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("TOP_K must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{s}' is not a positive integer")),
    }
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    match s.parse::<f32>() {
        Ok(t) if t.is_finite() => Ok(t),
        _ => Err(format!("'{s}' is not a finite number")),
    }
}

impl ClassifyArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(top_k) = self.top_k {
            config.tagging.top_k = top_k;
        }
        if let Some(threshold) = self.threshold {
            config.tagging.threshold = threshold;
        }
        if let Some(policy) = self.policy {
            config.tagging.policy = policy.into();
        }
        if let Some(pool) = &self.pool {
            config.tagging.pool = pool.clone();
        }
        if let Some(format) = self.tag_format {
            config.tagging.tag_format = format.into();
        }
        if let Some(parallel) = self.parallel {
            config.processing.parallel_workers = parallel;
        }
    }
}

/// Read the JSON array of paths from a file or stdin.
pub fn read_paths(input: &Path) -> anyhow::Result<Vec<String>> {
    let content = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read path list from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read path list {}", input.display()))?
    };
    parse_paths(&content)
}

fn parse_paths(content: &str) -> anyhow::Result<Vec<String>> {
    serde_json::from_str(content).context("Input must be a JSON array of path strings")
}

/// Execute the classify command.
pub async fn execute(args: ClassifyArgs, mut config: Config) -> anyhow::Result<()> {
    let input = args
        .input
        .clone()
        .context("An input file is required")?;

    args.apply(&mut config);
    config.validate()?;
    let paths = read_paths(&input)?;

    let style = TagStyle::resolve(config.tagging.tag_format, config.tagging.policy);
    let options = BatchOptions::from_config(&config);

    // Model loading is blocking ONNX work.
    let classifier = tokio::task::spawn_blocking(move || Classifier::from_config(&config))
        .await
        .context("Model loading task failed")??;

    let progress = if std::io::stderr().is_terminal() && !paths.is_empty() {
        Some(create_progress_bar(paths.len() as u64))
    } else {
        None
    };

    let report = classify_batch(&classifier, &paths, &options, |path, outcome| {
        if let Some(pb) = &progress {
            let name = file_name(path);
            pb.set_message(if outcome.is_err() {
                format!("skipped {name}")
            } else {
                name
            });
            pb.inc(1);
        }
    })
    .await;

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let report = report?;

    match &args.output {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let file = File::create(&expanded)
                .with_context(|| format!("Failed to create output file {expanded}"))?;
            OutputWriter::new(BufWriter::new(file), style, args.pretty)
                .write_results(&report.results)?;
            tracing::info!("Wrote {} results to {}", report.results.len(), expanded);
        }
        None => {
            let stdout = std::io::stdout().lock();
            OutputWriter::new(stdout, style, args.pretty).write_results(&report.results)?;
        }
    }

    Ok(())
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("loading...");
    pb
}
