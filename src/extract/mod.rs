//! Structural extraction for a single source file.
//!
//! One [`Scanner`] pass feeds every stage below it:
//!
//! - [`locator`] finds struct/enum headers and their attribute stacks
//! - [`fields`] splits bodies into fields or variants
//! - [`constraints`] reads Anchor `#[account(...)]`/`#[instruction(...)]` lists
//! - [`items`] picks up constants, `declare_id!` program ids and
//!   authority assertions such as `require_keys_eq!`
//!
//! Extraction of a file stops at the first scan error. Everything located
//! before the failing offset is kept and the error travels with the result.

pub mod constraints;
pub mod fields;
pub mod items;
pub mod locator;
mod types;

pub use types::{
    attribute_path, AccessCheck, AttributeBlock, Body, Constraint, ConstraintSource, ConstantDeclaration,
    DeclarationKind, FieldRecord, ProgramIdDeclaration, RawDeclaration,
};

use crate::scan::{ScanError, Scanner, SourceUnit};

use locator::DeclarationSite;

/// Everything recovered from one file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    pub path: String,
    pub declarations: Vec<RawDeclaration>,
    pub constants: Vec<ConstantDeclaration>,
    pub program_ids: Vec<ProgramIdDeclaration>,
    pub access_checks: Vec<AccessCheck>,
    /// First scan error, if extraction stopped early.
    pub error: Option<ScanError>,
}

impl FileExtraction {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Extract declarations, constants and program ids from one source unit.
pub fn extract_source(unit: &SourceUnit) -> FileExtraction {
    let scanner = Scanner::new(unit.text());
    let located = locator::locate_declarations(&scanner);
    let items = items::locate_items(&scanner, unit);

    let item_limit = items.error.as_ref().map_or(usize::MAX, ScanError::offset);
    let failure_limit = scanner.failure().map_or(usize::MAX, ScanError::offset);
    let limit = located.scanned_to.min(item_limit).min(failure_limit);

    let error = [located.error, items.error, scanner.failure().cloned()]
        .into_iter()
        .flatten()
        .min_by_key(ScanError::offset);

    let declarations = located
        .sites
        .into_iter()
        .filter(|site| site.head < limit)
        .map(|site| build_declaration(unit, &scanner, site))
        .collect();
    let constants = items
        .constants
        .into_iter()
        .filter(|(start, _)| *start < limit)
        .map(|(_, c)| c)
        .collect();
    let program_ids = items
        .program_ids
        .into_iter()
        .filter(|(start, _)| *start < limit)
        .map(|(_, p)| p)
        .collect();
    let access_checks = items
        .access_checks
        .into_iter()
        .filter(|(start, _)| *start < limit)
        .map(|(_, a)| a)
        .collect();

    FileExtraction {
        path: unit.path().to_string(),
        declarations,
        constants,
        program_ids,
        access_checks,
        error,
    }
}

fn build_declaration(unit: &SourceUnit, scanner: &Scanner<'_>, site: DeclarationSite) -> RawDeclaration {
    let fields = fields::extract_fields(scanner, site.kind, &site.body);
    let constraints = constraints::parse_constraints(&site.attributes);
    let derives = constraints::parse_derives(&site.attributes);
    let is_account = site.attributes.has_account();

    RawDeclaration {
        kind: site.kind,
        name: site.name,
        generics: site.generics,
        body: site.body,
        visibility: site.visibility,
        file: unit.path().to_string(),
        line: unit.line_of(site.head),
        depth: site.depth,
        text: scanner.source()[site.head..=site.end].to_string(),
        source_text: scanner.source()[site.start..=site.end].to_string(),
        fields,
        constraints,
        derives,
        is_account,
        attributes: site.attributes,
    }
}
