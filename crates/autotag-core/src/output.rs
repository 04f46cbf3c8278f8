//! Result document serialization.
//!
//! The document is a single JSON array with one object per input path:
//!
//! ```json
//! [{"image_path": "a.jpg", "tags": [["Cat", 0.93]]},
//!  {"image_path": "b.raf", "tags": []}]
//! ```
//!
//! Tags are either `[label, score]` pairs or bare labels, depending on the
//! configured [`TagFormat`].

use std::io::Write;

use serde::Serialize;

use crate::config::TagFormat;
use crate::error::Result;
use crate::tagging::RankingPolicy;
use crate::types::{ClassificationResult, TagMatch};

/// How a single tag is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    /// `["Cat", 0.93]`
    Scored,
    /// `"Cat"`
    Label,
}

impl TagStyle {
    /// Resolve the configured format against the active policy.
    ///
    /// `auto` renders bare labels for arg-max, scored pairs otherwise.
    pub fn resolve(format: TagFormat, policy: RankingPolicy) -> Self {
        match (format, policy) {
            (TagFormat::Scored, _) => TagStyle::Scored,
            (TagFormat::Labels, _) | (TagFormat::Auto, RankingPolicy::ArgMax) => TagStyle::Label,
            (TagFormat::Auto, _) => TagStyle::Scored,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum TagView<'a> {
    Scored(&'a str, f32),
    Label(&'a str),
}

#[derive(Serialize)]
struct ResultView<'a> {
    image_path: &'a str,
    tags: Vec<TagView<'a>>,
}

impl<'a> ResultView<'a> {
    fn new(result: &'a ClassificationResult, style: TagStyle) -> Self {
        let view = |m: &'a TagMatch| match style {
            TagStyle::Scored => TagView::Scored(&m.label, m.score),
            TagStyle::Label => TagView::Label(&m.label),
        };
        Self {
            image_path: &result.image_path,
            tags: result.tags.iter().map(view).collect(),
        }
    }
}

/// Writes the result document to any `Write` sink.
pub struct OutputWriter<W: Write> {
    writer: W,
    style: TagStyle,
    pretty: bool,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, style: TagStyle, pretty: bool) -> Self {
        Self {
            writer,
            style,
            pretty,
        }
    }

    /// Write all results as one JSON array followed by a newline.
    pub fn write_results(&mut self, results: &[ClassificationResult]) -> Result<()> {
        let json = to_json(results, self.style, self.pretty)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Serialize results to a JSON string.
pub fn to_json(
    results: &[ClassificationResult],
    style: TagStyle,
    pretty: bool,
) -> serde_json::Result<String> {
    let views: Vec<ResultView<'_>> = results.iter().map(|r| ResultView::new(r, style)).collect();
    if pretty {
        serde_json::to_string_pretty(&views)
    } else {
        serde_json::to_string(&views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ClassificationResult> {
        vec![
            ClassificationResult {
                image_path: "a.jpg".to_string(),
                tags: vec![TagMatch::new("Cat", 0.5), TagMatch::new("Sofa", 0.25)],
            },
            ClassificationResult::empty("b.raf"),
        ]
    }

    #[test]
    fn test_scored_pairs() {
        let json = to_json(&sample(), TagStyle::Scored, false).unwrap();
        assert_eq!(
            json,
            r#"[{"image_path":"a.jpg","tags":[["Cat",0.5],["Sofa",0.25]]},{"image_path":"b.raf","tags":[]}]"#
        );
    }

    #[test]
    fn test_labels_only() {
        let json = to_json(&sample(), TagStyle::Label, false).unwrap();
        assert_eq!(
            json,
            r#"[{"image_path":"a.jpg","tags":["Cat","Sofa"]},{"image_path":"b.raf","tags":[]}]"#
        );
    }

    #[test]
    fn test_empty_batch_is_empty_array() {
        assert_eq!(to_json(&[], TagStyle::Scored, false).unwrap(), "[]");
    }

    #[test]
    fn test_writer_emits_single_array() {
        let mut buffer = Vec::new();
        OutputWriter::new(&mut buffer, TagStyle::Scored, true)
            .write_results(&sample())
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["tags"][0][0], "Cat");
        assert_eq!(parsed[1]["image_path"], "b.raf");
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_style_resolution() {
        use RankingPolicy::*;
        assert_eq!(TagStyle::resolve(TagFormat::Auto, ArgMax), TagStyle::Label);
        assert_eq!(TagStyle::resolve(TagFormat::Auto, TopKThreshold), TagStyle::Scored);
        assert_eq!(TagStyle::resolve(TagFormat::Auto, CaptionMediated), TagStyle::Scored);
        assert_eq!(TagStyle::resolve(TagFormat::Scored, ArgMax), TagStyle::Scored);
        assert_eq!(TagStyle::resolve(TagFormat::Labels, TopKThreshold), TagStyle::Label);
    }
}
