//! Output formatting for extraction results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal summary for humans
//! - JSON: structured summary for programmatic consumption
//! - Text: the extracted context artifact itself

use anyhow::Context;
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::assemble::{DeclarationSummary, Stats};
use crate::classify::{Category, Parameter};
use crate::runner::{Diagnostic, Extraction};

// =============================================================================
// JSON Format
// =============================================================================

/// Structured summary of one run.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub files_total: usize,
    pub files_scanned: usize,
    pub files_complete: usize,
    pub declarations: Vec<DeclarationSummary>,
    pub stats: Stats,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl JsonReport {
    pub fn new(path: &str, extraction: &Extraction, output: Option<&Path>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: path.to_string(),
            files_total: extraction.files_total,
            files_scanned: extraction.files_scanned,
            files_complete: extraction.files_complete,
            declarations: extraction.context.summary(),
            stats: extraction.context.stats(),
            parameters: extraction.context.all_parameters().cloned().collect(),
            diagnostics: extraction.diagnostics.clone(),
            output: output.map(|p| p.display().to_string()),
        }
    }
}

/// Write the structured summary as JSON to stdout.
pub fn write_json(path: &str, extraction: &Extraction, output: Option<&Path>) -> anyhow::Result<()> {
    let report = JsonReport::new(path, extraction, output);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Text Artifact
// =============================================================================

/// Write the text artifact to `output`, or stdout when `None`.
///
/// Returns the number of bytes written.
pub fn write_text(extraction: &Extraction, output: Option<&Path>) -> anyhow::Result<usize> {
    let text = extraction.context.render_text();
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
            fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(text.as_bytes())?;
            lock.flush()?;
        }
    }
    Ok(text.len())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a human-readable summary of the run.
pub fn write_pretty(path: &str, extraction: &Extraction, output: Option<&Path>) {
    // Header
    println!();
    print!("  ");
    print!("{}", "anchorscope".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    if let Some(output) = output {
        print!("  {}", "Output:   ".dimmed());
        println!("{}", output.display());
    }
    println!();

    write_status(extraction);
    println!();

    let stats = extraction.context.stats();
    write_stats(&stats);
    println!();

    if !extraction.context.notes.is_empty() {
        write_notes(extraction);
        println!();
    }

    if !extraction.diagnostics.is_empty() {
        write_diagnostics(&extraction.diagnostics);
        println!();
    }
}

fn write_status(extraction: &Extraction) {
    if extraction.has_diagnostics() {
        print!("  {}", "! PARTIAL".yellow());
    } else {
        print!("  {}", "✓ COMPLETE".green());
    }
    println!(
        "  {} of {} files fully extracted",
        extraction.files_complete.to_string().bold(),
        extraction.files_total
    );
}

fn write_stats(stats: &Stats) {
    println!("  {}", "Extracted:".bold());
    println!("    {:<20} {:>5}", "declarations", stats.declarations);
    println!("    {:<20} {:>5}", "account structs", stats.account_structs);
    println!("    {:<20} {:>5}", "total fields", stats.total_fields);
    println!("    {:<20} {:>5}", "constants", stats.constants);
    println!("    {:<20} {:>5}", "program ids", stats.program_ids);
    println!("    {:<20} {:>5}", "governance notes", stats.governance_notes);
    println!("    {:<20} {:>5}", "defi parameters", stats.parameters);

    if stats.per_category.is_empty() {
        return;
    }
    println!();
    println!("  {}", "Categories:".bold());
    for category in Category::ALL {
        if let Some(count) = stats.per_category.get(&category) {
            println!("    {:<20} {:>5}", category.as_str(), count);
        }
    }
}

fn write_notes(extraction: &Extraction) {
    let notes = &extraction.context.notes;
    println!("  {} ({}):", "Governance".bold(), notes.len());
    for note in notes {
        print!("    {:<10}", note.keyword.magenta());
        print!("{}", note.file.blue());
        print!("{}", format!(":{}", note.line).dimmed());
        println!("  {}", note.struct_name);
    }
}

fn write_diagnostics(diagnostics: &[Diagnostic]) {
    println!("  {} ({}):", "Diagnostics".bold(), diagnostics.len());
    println!();
    for d in diagnostics {
        print!("    {} ", "WARN ".yellow());
        print!("{:<22}", d.kind.as_str().dimmed());
        print!("{}", d.file.blue());
        if let Some(line) = d.line {
            print!("{}", format!(":{}", line).dimmed());
        }
        println!();
        println!("            {}", d.message);
    }
}
