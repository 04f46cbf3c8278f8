//! Extension-based format guard.
//!
//! Raw sensor files are rejected by suffix before any I/O, so no encoder or
//! decoder ever sees them.

use std::path::Path;

use crate::config::ProcessingConfig;
use crate::error::SkipReason;

/// Rejects paths whose extension is on the unsupported list.
#[derive(Debug, Clone)]
pub struct FormatGuard {
    unsupported: Vec<String>,
}

impl FormatGuard {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self::from_extensions(&config.unsupported_extensions)
    }

    pub fn from_extensions(extensions: &[String]) -> Self {
        Self {
            unsupported: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// `Err` with the offending extension when the path must be skipped.
    pub fn check(&self, path: &Path) -> Result<(), SkipReason> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(());
        };
        let ext = ext.to_lowercase();
        if self.unsupported.contains(&ext) {
            Err(SkipReason::UnsupportedFormat(ext))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> FormatGuard {
        FormatGuard::new(&ProcessingConfig::default())
    }

    #[test]
    fn test_raw_suffixes_rejected() {
        for name in ["a.raf", "b.CR2", "c.nef", "d.Dng", "e.arw"] {
            assert!(guard().check(Path::new(name)).is_err(), "{name}");
        }
    }

    #[test]
    fn test_common_formats_pass() {
        for name in ["a.jpg", "b.JPEG", "c.png", "d.webp", "no_extension"] {
            assert!(guard().check(Path::new(name)).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_reason_names_extension() {
        let err = guard().check(Path::new("/photos/IMG_0001.RAF")).unwrap_err();
        assert_eq!(err, SkipReason::UnsupportedFormat("raf".to_string()));
    }

    #[test]
    fn test_custom_list_accepts_leading_dot() {
        let guard = FormatGuard::from_extensions(&[".heic".to_string()]);
        assert!(guard.check(Path::new("x.HEIC")).is_err());
        assert!(guard.check(Path::new("x.raf")).is_ok());
    }
}
