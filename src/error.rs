//! Error taxonomy for extraction runs.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::scan::ScanError;

/// Errors raised by [`Runner`](crate::runner::Runner).
///
/// `Io`, `FileTooLarge` and `Scan` concern a single file and are turned into
/// diagnostics; the rest abort the run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is {size} bytes, above the {limit} byte limit", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("{path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: ScanError,
    },
    #[error("no readable Rust source files under {}", root.display())]
    EmptyProject { root: PathBuf },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ExtractError {
    /// Whether the error ends the whole run rather than one file.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ExtractError::Io { .. } | ExtractError::FileTooLarge { .. } | ExtractError::Scan { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::DelimiterKind;

    #[test]
    fn test_fatality() {
        let scan = ExtractError::Scan {
            path: "lib.rs".to_string(),
            source: ScanError::UnbalancedDelimiter {
                kind: DelimiterKind::Brace,
                offset: 3,
            },
        };
        assert!(!scan.is_fatal());
        assert_eq!(
            scan.to_string(),
            "lib.rs: unbalanced brace delimiter opened at byte 3"
        );

        let empty = ExtractError::EmptyProject {
            root: PathBuf::from("/tmp/x"),
        };
        assert!(empty.is_fatal());
        assert!(ExtractError::from(ConfigError::ZeroFileSize).is_fatal());
    }
}
