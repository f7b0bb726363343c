//! Extraction runner that orchestrates a whole tree.
//!
//! Files are collected with walkdir, extracted independently on a rayon
//! pool, then merged in relative-path order so the result does not depend
//! on the number of workers.

use globset::GlobSet;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::assemble::{assemble, AggregateContext, FileRecord};
use crate::classify::{Classifier, SignatureTable};
use crate::config::Config;
use crate::error::ExtractError;
use crate::extract::extract_source;
use crate::scan::{ScanError, SourceUnit};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Directory names skipped unless test files are included.
const TEST_DIRS: &[&str] = &["tests", "test", "__tests__"];

/// Kind of per-file problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Io,
    FileTooLarge,
    UnterminatedLiteral,
    UnbalancedDelimiter,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Io => "io",
            DiagnosticKind::FileTooLarge => "file_too_large",
            DiagnosticKind::UnterminatedLiteral => "unterminated_literal",
            DiagnosticKind::UnbalancedDelimiter => "unbalanced_delimiter",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file that could not be fully extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Line the problem starts on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    /// Diagnostic for a per-file error. `line` locates scan errors.
    fn from_error(file: &str, err: &ExtractError, line: Option<usize>) -> Self {
        let (kind, message) = match err {
            ExtractError::Scan { source, .. } => {
                let kind = match source {
                    ScanError::UnterminatedLiteral { .. } => DiagnosticKind::UnterminatedLiteral,
                    ScanError::UnbalancedDelimiter { .. } => DiagnosticKind::UnbalancedDelimiter,
                };
                let message = match line {
                    Some(line) => format!("{} (line {})", source, line),
                    None => source.to_string(),
                };
                (kind, message)
            }
            ExtractError::FileTooLarge { .. } => (DiagnosticKind::FileTooLarge, err.to_string()),
            _ => (DiagnosticKind::Io, err.to_string()),
        };
        Self {
            file: file.to_string(),
            kind,
            message,
            line,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub context: AggregateContext,
    /// Per-file problems, in path order.
    pub diagnostics: Vec<Diagnostic>,
    /// Source files considered.
    pub files_total: usize,
    /// Files read and scanned (fully or partially).
    pub files_scanned: usize,
    /// Files scanned without any scan error.
    pub files_complete: usize,
}

impl Extraction {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Files found by a walk, plus entries the walk could not read.
#[derive(Debug, Default)]
pub struct FileSet {
    pub files: Vec<PathBuf>,
    /// Unreadable entries below the root (dangling links, denied directories).
    pub unreadable: Vec<Diagnostic>,
}

/// Result of processing one file.
enum FileOutcome {
    Scanned {
        record: FileRecord,
        diagnostic: Option<Diagnostic>,
    },
    Skipped(Diagnostic),
}

/// Runs extraction over a tree.
pub struct Runner {
    config: Config,
    classifier: Classifier,
    excluded: GlobSet,
    jobs: Option<usize>,
}

impl Runner {
    /// Create a runner. The signature table is built here, once.
    pub fn new(config: Config) -> Result<Self, ExtractError> {
        config.validate()?;
        let excluded = config.excluded_set()?;
        let table = SignatureTable::with_overrides(&config.category_keyword_overrides);
        Ok(Self {
            classifier: Classifier::new(Arc::new(table)),
            config,
            excluded,
            jobs: None,
        })
    }

    /// Use a dedicated pool of `jobs` workers instead of the global pool.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs.filter(|&n| n > 0);
        self
    }

    /// Extract a directory tree, or a single file.
    pub fn run<P: AsRef<Path>>(&self, root: P) -> Result<Extraction, ExtractError> {
        let root = root.as_ref();
        if root.is_file() {
            let base = root.parent().unwrap_or_else(|| Path::new(""));
            return self.run_files(base, &[root.to_path_buf()]);
        }
        let set = self.collect_files(root)?;
        self.extract_all(root, &set.files, set.unreadable)
    }

    /// Extract `files`, naming them relative to `base`.
    pub fn run_files(&self, base: &Path, files: &[PathBuf]) -> Result<Extraction, ExtractError> {
        self.extract_all(base, files, Vec::new())
    }

    fn extract_all(
        &self,
        base: &Path,
        files: &[PathBuf],
        unreadable: Vec<Diagnostic>,
    ) -> Result<Extraction, ExtractError> {
        let mut named: Vec<(String, &PathBuf)> =
            files.iter().map(|f| (relative_name(base, f), f)).collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));

        let process = || -> Vec<FileOutcome> {
            named
                .par_iter()
                .map(|(name, path)| self.process_file(name, path))
                .collect()
        };
        let outcomes = match self.jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()?
                .install(process),
            None => process(),
        };

        let files_total = files.len() + unreadable.len();
        let mut records = Vec::new();
        let mut diagnostics = unreadable;
        let mut files_scanned = 0;
        let mut files_complete = 0;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Scanned { record, diagnostic } => {
                    files_scanned += 1;
                    match diagnostic {
                        Some(d) => diagnostics.push(d),
                        None => files_complete += 1,
                    }
                    records.push(record);
                }
                FileOutcome::Skipped(d) => diagnostics.push(d),
            }
        }

        diagnostics.sort_by(|a, b| a.file.cmp(&b.file));
        for d in &diagnostics {
            warn!("{}: {}", d.file, d.message);
        }

        if files_scanned == 0 {
            return Err(ExtractError::EmptyProject {
                root: base.to_path_buf(),
            });
        }

        Ok(Extraction {
            context: assemble(records, self.config.include_unclassified),
            diagnostics,
            files_total,
            files_scanned,
            files_complete,
        })
    }

    fn process_file(&self, name: &str, path: &Path) -> FileOutcome {
        let unit = match self.read_unit(name, path) {
            Ok(unit) => unit,
            Err(e) => return FileOutcome::Skipped(Diagnostic::from_error(name, &e, None)),
        };

        let extraction = extract_source(&unit);
        debug!(
            "{}: {} declarations, {} constants, {} program ids",
            name,
            extraction.declarations.len(),
            extraction.constants.len(),
            extraction.program_ids.len()
        );
        let diagnostic = extraction.error.clone().map(|source| {
            let line = unit.line_of(source.offset());
            let err = ExtractError::Scan {
                path: name.to_string(),
                source,
            };
            Diagnostic::from_error(name, &err, Some(line))
        });

        FileOutcome::Scanned {
            record: FileRecord::new(extraction, &self.classifier),
            diagnostic,
        }
    }

    fn read_unit(&self, name: &str, path: &Path) -> Result<SourceUnit, ExtractError> {
        let io = |source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = fs::metadata(path).map_err(io)?.len();
        if size > self.config.max_file_size {
            return Err(ExtractError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.config.max_file_size,
            });
        }
        let text = fs::read_to_string(path).map_err(io)?;
        Ok(SourceUnit::new(name, text))
    }

    /// Collect `.rs` files under `root`, sorted by path.
    ///
    /// Failing to read the root itself is fatal. Entries below it that cannot
    /// be read are reported in [`FileSet::unreadable`] and the walk goes on.
    pub fn collect_files(&self, root: &Path) -> Result<FileSet, ExtractError> {
        let include_tests = self.config.include_test_files;
        let mut set = FileSet::default();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                // Skip hidden directories
                if name.starts_with('.') {
                    return false;
                }
                if SKIPPED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                include_tests || !TEST_DIRS.contains(&name.as_ref())
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source.path().unwrap_or(root).to_path_buf();
                    let err = if source.depth() == 0 {
                        ExtractError::Walk {
                            root: root.to_path_buf(),
                            source,
                        }
                    } else {
                        ExtractError::Io {
                            path: path.clone(),
                            source: source.into(),
                        }
                    };
                    if err.is_fatal() {
                        return Err(err);
                    }
                    let name = relative_name(root, &path);
                    let other_ext = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map_or(false, |e| e != "rs");
                    if other_ext || self.excluded.is_match(&name) {
                        continue;
                    }
                    set.unreadable.push(Diagnostic::from_error(&name, &err, None));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("rs") {
                continue;
            }
            if !include_tests && is_test_file(path) {
                continue;
            }
            if self.excluded.is_match(relative_name(root, path)) {
                debug!("excluded {}", path.display());
                continue;
            }
            set.files.push(path.to_path_buf());
        }

        Ok(set)
    }
}

/// `*_test.rs` and `tests.rs` files.
fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("_test.rs") || n == "tests.rs")
        .unwrap_or(false)
}

/// `/`-separated path of `file` relative to `base`.
fn relative_name(base: &Path, file: &Path) -> String {
    file.strip_prefix(base)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_files_skips() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "programs/p/src/lib.rs", "struct A;");
        write(root, "programs/p/src/state_test.rs", "struct T;");
        write(root, "programs/p/tests/it.rs", "struct I;");
        write(root, "target/debug/build.rs", "struct B;");
        write(root, ".anchor/x.rs", "struct H;");
        write(root, "migrations/deploy.rs", "struct M;");
        write(root, "README.md", "# readme");

        let config = Config {
            excluded_paths: vec!["migrations/**".to_string()],
            ..Default::default()
        };
        let runner = Runner::new(config).unwrap();
        let files = runner.collect_files(root).unwrap().files;
        let names: Vec<String> = files.iter().map(|f| relative_name(root, f)).collect();
        assert_eq!(names, vec!["programs/p/src/lib.rs"]);

        let config = Config {
            include_test_files: true,
            ..Default::default()
        };
        let runner = Runner::new(config).unwrap();
        let files = runner.collect_files(root).unwrap().files;
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_run_with_diagnostics() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a.rs", "#[account]\npub struct Global { pub authority: Pubkey }\n");
        write(root, "b.rs", "pub struct Broken {\n    a: u8,\n");
        fs::write(root.join("c.rs"), [0xffu8, 0xfe, 0x00]).unwrap();

        let runner = Runner::new(Config::default()).unwrap();
        let result = runner.run(root).unwrap();

        assert_eq!(result.files_total, 3);
        assert_eq!(result.files_scanned, 2);
        assert_eq!(result.files_complete, 1);
        let kinds: Vec<(&str, DiagnosticKind)> = result
            .diagnostics
            .iter()
            .map(|d| (d.file.as_str(), d.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("b.rs", DiagnosticKind::UnbalancedDelimiter),
                ("c.rs", DiagnosticKind::Io),
            ]
        );
        assert_eq!(result.diagnostics[0].line, Some(1));
        assert_eq!(result.context.declarations().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_becomes_diagnostic() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a.rs", "#[account]\npub struct Vault { pub reserve: u64 }\n");
        std::os::unix::fs::symlink(root.join("missing.rs"), root.join("b.rs")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.md"), root.join("notes.md")).unwrap();

        let runner = Runner::new(Config::default()).unwrap();
        let result = runner.run(root).unwrap();

        assert_eq!(result.files_total, 2);
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.files_complete, 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].file, "b.rs");
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::Io);
        assert_eq!(result.diagnostics[0].line, None);
        let names: Vec<&str> = result
            .context
            .declarations()
            .map(|d| d.declaration.name.as_str())
            .collect();
        assert_eq!(names, vec!["Vault"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let runner = Runner::new(Config::default()).unwrap();
        let err = runner.collect_files(&temp.path().join("gone")).unwrap_err();
        assert!(matches!(err, ExtractError::Walk { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_scan_diagnostic_message_names_line() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "s.rs", "struct A;\n}\n");
        let result = Runner::new(Config::default()).unwrap().run(temp.path()).unwrap();
        let d = &result.diagnostics[0];
        assert_eq!(d.kind, DiagnosticKind::UnbalancedDelimiter);
        assert_eq!(d.line, Some(2));
        assert!(d.message.ends_with("(line 2)"), "{}", d.message);
    }

    #[test]
    fn test_file_too_large() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "big.rs", "struct Big { a: u8 }");
        write(temp.path(), "small.rs", "struct S;");
        let config = Config {
            max_file_size: 10,
            ..Default::default()
        };
        let result = Runner::new(config).unwrap().run(temp.path()).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::FileTooLarge);
        assert_eq!(result.diagnostics[0].file, "big.rs");
    }

    #[test]
    fn test_empty_project_is_fatal() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "notes.txt", "struct NotRust;");
        let err = Runner::new(Config::default())
            .unwrap()
            .run(temp.path())
            .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyProject { .. }));
    }

    #[test]
    fn test_single_file_root() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "only.rs", "pub const X: u8 = 1;");
        let result = Runner::new(Config::default())
            .unwrap()
            .run(temp.path().join("only.rs"))
            .unwrap();
        assert_eq!(result.context.constants[0].file, "only.rs");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            max_file_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Runner::new(config),
            Err(ExtractError::Config(_))
        ));
    }
}
