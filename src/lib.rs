//! Anchorscope - structural context extraction for Anchor programs.
//!
//! Anchorscope reads a Solana/Anchor source tree and recovers complete,
//! byte-exact struct and enum definitions (attributes, generics and account
//! constraints included), constants and `declare_id!` program ids. Each
//! declaration is scored against a keyword table to place it in a protocol
//! category, and the whole result is assembled into one context file meant
//! to be read by downstream vulnerability analysis.
//!
//! # Architecture
//!
//! No compiler front end is involved; everything rests on a delimiter-aware
//! lexical scan:
//!
//! - `scan`: byte classification (code, strings, comments) and delimiter matching
//! - `extract`: declaration, field, constraint and item extraction per file
//! - `classify`: keyword scoring, governance notes and DeFi parameters
//! - `assemble`: path-ordered merge and the text artifact
//! - `runner`: file collection and parallel per-file extraction
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON, text)

pub mod assemble;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod report;
pub mod runner;
pub mod scan;

pub use assemble::{assemble, AggregateContext, DeclarationSummary, FileRecord, Stats};
pub use classify::{
    Category, Classification, ClassifiedDeclaration, Classifier, Parameter, SignatureTable,
};
pub use config::{Config, ConfigError};
pub use error::ExtractError;
pub use extract::{extract_source, FileExtraction, RawDeclaration};
pub use runner::{Diagnostic, DiagnosticKind, Extraction, Runner};
pub use scan::{ScanError, Scanner, SourceUnit};
