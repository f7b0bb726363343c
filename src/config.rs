//! Run configuration for anchorscope.
//!
//! Loaded from `anchorscope.yaml` (or `.anchorscope.yaml`) in the working
//! directory, or from an explicit `--config` path. Every option has a
//! default, so an empty file is a valid configuration.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::Category;

/// File names probed by [`Config::discover`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["anchorscope.yaml", ".anchorscope.yaml"];

/// Default upper bound on the size of a scanned file (2 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid excluded_paths pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("max_file_size must be greater than zero")]
    ZeroFileSize,
    #[error("category_keyword_overrides cannot target the unclassified category")]
    UnclassifiedOverride,
    #[error("replace override for {0} must list at least one keyword")]
    EmptyReplace(Category),
}

/// How an override combines with the built-in keyword list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// Append to the defaults.
    #[default]
    Extend,
    /// Discard the defaults for this category.
    Replace,
}

/// Keyword override for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeywordOverride {
    #[serde(default)]
    pub mode: OverrideMode,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Emit declarations that matched no category (default: true)
    #[serde(default = "default_true")]
    pub include_unclassified: bool,
    #[serde(default)]
    pub category_keyword_overrides: BTreeMap<Category, KeywordOverride>,
    /// Files larger than this many bytes are skipped with a diagnostic
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Glob patterns for paths to skip (e.g. "**/migrations/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Scan `tests/` directories and `*_test.rs` files (default: false)
    #[serde(default)]
    pub include_test_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_unclassified: true,
            category_keyword_overrides: BTreeMap::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            excluded_paths: Vec::new(),
            include_test_files: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from YAML text. Empty text yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Find a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Compile `excluded_paths` into a single matcher.
    pub fn excluded_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.excluded_paths.join(", "),
            source,
        })
    }

    /// Validate the configuration for correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::ZeroFileSize);
        }

        for (category, over) in &self.category_keyword_overrides {
            if *category == Category::Unclassified {
                return Err(ConfigError::UnclassifiedOverride);
            }
            let has_keywords = over.keywords.iter().any(|k| !k.trim().is_empty());
            if over.mode == OverrideMode::Replace && !has_keywords {
                return Err(ConfigError::EmptyReplace(*category));
            }
        }

        self.excluded_set()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
include_unclassified: false
max_file_size: 1048576
excluded_paths:
  - "**/migrations/**"
category_keyword_overrides:
  oracle:
    mode: extend
    keywords: ["aggregator"]
  governance:
    mode: replace
    keywords: ["council"]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(!config.include_unclassified);
        assert_eq!(config.max_file_size, 1_048_576);
        assert_eq!(config.excluded_paths.len(), 1);
        let gov = &config.category_keyword_overrides[&Category::Governance];
        assert_eq!(gov.mode, OverrideMode::Replace);
        assert_eq!(gov.keywords, vec!["council"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert!(config.include_unclassified);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(!config.include_test_files);

        let config = Config::from_yaml("include_test_files: true\n").unwrap();
        assert!(config.include_unclassified);
        assert!(config.include_test_files);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            max_file_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFileSize)));

        let config = Config {
            excluded_paths: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Glob { .. })));

        let mut config = Config::default();
        config.category_keyword_overrides.insert(
            Category::Vault,
            KeywordOverride {
                mode: OverrideMode::Replace,
                keywords: vec![],
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyReplace(Category::Vault))
        ));
    }

    #[test]
    fn test_unclassified_override_rejected() {
        let yaml = "category_keyword_overrides:\n  unclassified:\n    keywords: [x]\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnclassifiedOverride)
        ));
    }

    #[test]
    fn test_unknown_category_is_parse_error() {
        let yaml = "category_keyword_overrides:\n  bridge:\n    keywords: [x]\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_discover() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(Config::discover(temp.path()).is_none());
        std::fs::write(temp.path().join(".anchorscope.yaml"), "").unwrap();
        let found = Config::discover(temp.path()).unwrap();
        assert!(found.ends_with(".anchorscope.yaml"));
    }
}
