//! CLI enum types: ranking policy and tag format.

use autotag_core::{RankingPolicy, TagFormat};
use clap::ValueEnum;

/// Ranking policy selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Best `TOP_K` tags scoring above `THRESHOLD`
    TopK,
    /// The single best tag
    ArgMax,
    /// Caption the image, then pick the tag closest to the caption
    Caption,
}

impl From<PolicyArg> for RankingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::TopK => RankingPolicy::TopKThreshold,
            PolicyArg::ArgMax => RankingPolicy::ArgMax,
            PolicyArg::Caption => RankingPolicy::CaptionMediated,
        }
    }
}

/// Tag rendering selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TagFormatArg {
    /// Labels for arg-max, scored pairs otherwise
    Auto,
    /// `[label, score]` pairs
    Scored,
    /// Bare labels
    Labels,
}

impl From<TagFormatArg> for TagFormat {
    fn from(arg: TagFormatArg) -> Self {
        match arg {
            TagFormatArg::Auto => TagFormat::Auto,
            TagFormatArg::Scored => TagFormat::Scored,
            TagFormatArg::Labels => TagFormat::Labels,
        }
    }
}
