//! Context assembly.
//!
//! Per-file records are merged in path order into one [`AggregateContext`].
//! The text artifact, the structured summary and the statistics are all
//! derived from that context; nothing is re-parsed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::classify::{
    access_parameter, constant_parameters, Category, ClassifiedDeclaration, Classifier,
    GovernanceNote, Parameter,
};
use crate::extract::{ConstantDeclaration, DeclarationKind, FileExtraction, ProgramIdDeclaration};

pub const TEXT_HEADER: &str = "// Extracted Solana Contract Structures for AI Vulnerability Analysis\n\
// Complete context to prevent cross-file misanalysis\n\n\
use anchor_lang::prelude::*;\n";

/// Classified output of one file, ready to merge.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    pub path: String,
    pub program_ids: Vec<ProgramIdDeclaration>,
    pub constants: Vec<ConstantDeclaration>,
    pub declarations: Vec<ClassifiedDeclaration>,
    /// Parameters from constants and access checks, in line order.
    pub parameters: Vec<Parameter>,
}

impl FileRecord {
    pub fn new(extraction: FileExtraction, classifier: &Classifier) -> Self {
        let mut parameters: Vec<Parameter> = extraction
            .constants
            .iter()
            .flat_map(constant_parameters)
            .chain(extraction.access_checks.iter().map(access_parameter))
            .collect();
        parameters.sort_by_key(|p| p.line);

        Self {
            path: extraction.path,
            parameters,
            program_ids: extraction.program_ids,
            constants: extraction.constants,
            declarations: extraction
                .declarations
                .into_iter()
                .map(|d| classifier.annotate(d))
                .collect(),
        }
    }
}

/// Declarations of one category, in file-path then source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructGroup {
    pub category: Category,
    pub members: Vec<ClassifiedDeclaration>,
}

/// The merged result of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateContext {
    pub program_ids: Vec<ProgramIdDeclaration>,
    pub constants: Vec<ConstantDeclaration>,
    /// Non-empty groups in category precedence order.
    pub groups: Vec<StructGroup>,
    /// One note per (keyword, struct name), in discovery order.
    pub notes: Vec<GovernanceNote>,
    /// Parameters read outside declarations (constants, access checks).
    pub parameters: Vec<Parameter>,
}

/// Append-only accumulator behind [`assemble`].
#[derive(Debug, Default)]
pub struct Assembler {
    include_unclassified: bool,
    program_ids: Vec<ProgramIdDeclaration>,
    constants: Vec<ConstantDeclaration>,
    groups: BTreeMap<Category, Vec<ClassifiedDeclaration>>,
    notes: Vec<GovernanceNote>,
    seen_notes: HashSet<(String, String)>,
    parameters: Vec<Parameter>,
}

impl Assembler {
    pub fn new(include_unclassified: bool) -> Self {
        Self {
            include_unclassified,
            ..Default::default()
        }
    }

    /// Append one file. Callers must merge files in path order.
    pub fn merge(&mut self, record: FileRecord) {
        self.program_ids.extend(record.program_ids);
        self.constants.extend(record.constants);
        self.parameters.extend(record.parameters);

        for decl in record.declarations {
            for note in &decl.notes {
                let (keyword, name) = note.key();
                if self.seen_notes.insert((keyword.to_string(), name.to_string())) {
                    self.notes.push(note.clone());
                }
            }

            let category = decl.classification.category;
            if category == Category::Unclassified && !self.include_unclassified {
                continue;
            }
            self.groups.entry(category).or_default().push(decl);
        }
    }

    pub fn finish(self) -> AggregateContext {
        AggregateContext {
            program_ids: self.program_ids,
            constants: self.constants,
            groups: self
                .groups
                .into_iter()
                .map(|(category, members)| StructGroup { category, members })
                .collect(),
            notes: self.notes,
            parameters: self.parameters,
        }
    }
}

/// Sort records by path and merge them.
pub fn assemble(mut records: Vec<FileRecord>, include_unclassified: bool) -> AggregateContext {
    records.sort_by(|a, b| a.path.cmp(&b.path));
    let mut assembler = Assembler::new(include_unclassified);
    for record in records {
        assembler.merge(record);
    }
    assembler.finish()
}

/// One row of the structured summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSummary {
    pub name: String,
    pub kind: DeclarationKind,
    pub file: String,
    pub line: usize,
    pub field_count: usize,
    pub category: Category,
    pub score: usize,
    pub keywords: Vec<String>,
    pub is_account: bool,
}

/// Counts printed at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub declarations: usize,
    pub account_structs: usize,
    pub total_fields: usize,
    pub constants: usize,
    pub program_ids: usize,
    pub governance_notes: usize,
    /// Parameters on emitted declarations plus file-level ones.
    pub parameters: usize,
    pub per_category: BTreeMap<Category, usize>,
}

impl AggregateContext {
    /// All emitted declarations in output order.
    pub fn declarations(&self) -> impl Iterator<Item = &ClassifiedDeclaration> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.program_ids.is_empty()
            && self.constants.is_empty()
            && self.groups.is_empty()
            && self.notes.is_empty()
            && self.parameters.is_empty()
    }

    /// Every parameter: file-level ones, then those of emitted declarations.
    pub fn all_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .chain(self.declarations().flat_map(|c| c.params.iter()))
    }

    pub fn summary(&self) -> Vec<DeclarationSummary> {
        self.declarations()
            .map(|c| DeclarationSummary {
                name: c.declaration.name.clone(),
                kind: c.declaration.kind,
                file: c.declaration.file.clone(),
                line: c.declaration.line,
                field_count: c.declaration.fields.len(),
                category: c.classification.category,
                score: c.classification.score,
                keywords: c.classification.keywords.clone(),
                is_account: c.declaration.is_account,
            })
            .collect()
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            constants: self.constants.len(),
            program_ids: self.program_ids.len(),
            governance_notes: self.notes.len(),
            parameters: self.all_parameters().count(),
            ..Default::default()
        };
        for group in &self.groups {
            stats.per_category.insert(group.category, group.members.len());
        }
        for c in self.declarations() {
            stats.declarations += 1;
            stats.total_fields += c.declaration.fields.len();
            if c.declaration.is_account {
                stats.account_structs += 1;
            }
        }
        stats
    }

    /// The text artifact.
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    fn render(&self, out: &mut impl fmt::Write) -> fmt::Result {
        out.write_str(TEXT_HEADER)?;

        if !self.program_ids.is_empty() {
            section(out, "PROGRAM IDs")?;
            for id in &self.program_ids {
                writeln!(out, "// {}:{}", id.file, id.line)?;
                writeln!(out, "{};\n", id.text)?;
            }
        }

        if !self.constants.is_empty() {
            section(out, "CONSTANTS")?;
            for c in &self.constants {
                writeln!(out, "// {}:{}", c.file, c.line)?;
                writeln!(out, "{}\n", c.text)?;
            }
        }

        if !self.groups.is_empty() {
            section(out, "COMPLETE STRUCT DEFINITIONS")?;
            for group in &self.groups {
                section(out, group.category.header())?;
                for member in &group.members {
                    let decl = &member.declaration;
                    writeln!(out, "// {}:{}", decl.file, decl.line)?;
                    if !member.classification.keywords.is_empty() {
                        writeln!(
                            out,
                            "// matched: {}",
                            member.classification.keywords.join(", ")
                        )?;
                    }
                    for param in &member.params {
                        writeln!(out, "// param: {}", param)?;
                    }
                    writeln!(out, "{}\n", decl.verbatim())?;
                }
            }
        }

        if !self.parameters.is_empty() {
            section(out, "DEFI PARAMETERS")?;
            for param in &self.parameters {
                writeln!(out, "// {}:{}", param.file, param.line)?;
                writeln!(out, "// {}: {}\n", param.subject, param)?;
            }
        }

        if !self.notes.is_empty() {
            section(out, "GOVERNANCE")?;
            for note in &self.notes {
                writeln!(out, "// {}:{}", note.file, note.line)?;
                writeln!(
                    out,
                    "// {}: {} in `{}`\n",
                    note.struct_name, note.keyword, note.matched
                )?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for AggregateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f)
    }
}

fn section(out: &mut impl fmt::Write, title: &str) -> fmt::Result {
    writeln!(out, "\n// ===== {} =====\n", title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_source;
    use crate::scan::SourceUnit;

    fn record(path: &str, src: &str) -> FileRecord {
        FileRecord::new(
            extract_source(&SourceUnit::new(path, src)),
            &Classifier::default(),
        )
    }

    #[test]
    fn test_groups_follow_precedence_and_path_order() {
        let records = vec![
            record("b.rs", "struct BVault { reserve: u64 }\nstruct Feed { price: u64 }"),
            record("a.rs", "struct AVault { stake: u64 }\nstruct Plain { x: u8 }"),
        ];
        let ctx = assemble(records, true);
        let layout: Vec<(Category, Vec<&str>)> = ctx
            .groups
            .iter()
            .map(|g| {
                (
                    g.category,
                    g.members.iter().map(|m| m.declaration.name.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(
            layout,
            vec![
                (Category::Oracle, vec!["Feed"]),
                (Category::Vault, vec!["AVault", "BVault"]),
                (Category::Unclassified, vec!["Plain"]),
            ]
        );
    }

    #[test]
    fn test_exclude_unclassified() {
        let ctx = assemble(vec![record("a.rs", "struct Plain { x: u8 }")], false);
        assert!(ctx.groups.is_empty());
        assert!(!ctx.render_text().contains("COMPLETE STRUCT DEFINITIONS"));
    }

    #[test]
    fn test_notes_deduplicated_by_keyword_and_struct() {
        let ctx = assemble(
            vec![
                record(
                    "a.rs",
                    "struct Cfg { admin: Pubkey, backup_admin: Pubkey, dao: Pubkey }",
                ),
                record("b.rs", "struct Cfg { admin_key: Pubkey }\nstruct Other { admin: Pubkey }"),
            ],
            true,
        );
        let keys: Vec<(&str, &str, &str)> = ctx
            .notes
            .iter()
            .map(|n| (n.keyword.as_str(), n.struct_name.as_str(), n.file.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("admin", "Cfg", "a.rs"),
                ("dao", "Cfg", "a.rs"),
                ("admin", "Other", "b.rs"),
            ]
        );
    }

    #[test]
    fn test_render_text_sections() {
        let ctx = assemble(
            vec![record(
                "programs/vault/src/lib.rs",
                "declare_id!(\"Vau1t11111111111111111111111111111111111111\");\n\npub const FEE: u64 = 5;\n\n#[account(has_one = authority)]\npub struct Vault { pub authority: Pubkey, pub reserve: u64 }\n",
            )],
            true,
        );
        let text = ctx.render_text();
        assert!(text.starts_with(TEXT_HEADER));
        let order: Vec<usize> = [
            "// ===== PROGRAM IDs =====",
            "// ===== CONSTANTS =====",
            "// ===== COMPLETE STRUCT DEFINITIONS =====",
            "// ===== VAULT =====",
        ]
        .iter()
        .map(|h| text.find(h).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains(
            "// programs/vault/src/lib.rs:1\ndeclare_id!(\"Vau1t11111111111111111111111111111111111111\");\n"
        ));
        assert!(text.contains("// programs/vault/src/lib.rs:3\npub const FEE: u64 = 5;\n"));
        assert!(text.contains(
            "// programs/vault/src/lib.rs:6\n// matched: vault, reserve\n#[account(has_one = authority)]\npub struct Vault { pub authority: Pubkey, pub reserve: u64 }\n"
        ));
        assert!(!text.contains("===== GOVERNANCE ====="));
    }

    #[test]
    fn test_parameters_rendered_in_groups_and_section() {
        let ctx = assemble(
            vec![record(
                "lib.rs",
                "pub const MAX_SLIPPAGE: u16 = 300;

pub struct Pool {
    pub liquidity: u64,
    pub upgrade_authority: Pubkey,
}

pub fn set(ctx: Context<Set>) -> Result<()> {
    require!(ctx.accounts.admin.is_signer, E::Auth);
    Ok(())
}
",
            )],
            true,
        );
        let file_level: Vec<String> = ctx.parameters.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            file_level,
            vec![
                "pool.slippage = 300",
                "governance.access_control = require!(ctx.accounts.admin.is_signer, E::Auth)",
            ]
        );
        assert_eq!(ctx.stats().parameters, 3);

        let text = ctx.render_text();
        assert!(text.contains(
            "// lib.rs:3
// matched: pool, liquidity
// param: governance.upgrade = upgrade_authority
pub struct Pool {
"
        ));
        let params = text.find("// ===== DEFI PARAMETERS =====").unwrap();
        let groups = text.find("// ===== COMPLETE STRUCT DEFINITIONS =====").unwrap();
        assert!(groups < params);
        assert!(text.contains("// lib.rs:1
// MAX_SLIPPAGE: pool.slippage = 300
"));
        assert!(text.contains("// lib.rs:9
// require!: governance.access_control = require!("));
    }

    #[test]
    fn test_stats_and_summary() {
        let ctx = assemble(
            vec![record(
                "a.rs",
                "#[account]\npub struct Pool { pub liquidity: u64, pub admin: Pubkey }\nenum Side { Bid, Ask }",
            )],
            true,
        );
        let stats = ctx.stats();
        assert_eq!(stats.declarations, 2);
        assert_eq!(stats.account_structs, 1);
        assert_eq!(stats.total_fields, 4);
        assert_eq!(stats.per_category.get(&Category::Pool), Some(&1));
        assert_eq!(stats.governance_notes, 1);

        let summary = ctx.summary();
        assert_eq!(summary[0].name, "Pool");
        assert_eq!(summary[0].field_count, 2);
        assert_eq!(summary[1].kind, DeclarationKind::Enum);
        assert_eq!(summary[1].category, Category::Unclassified);
    }
}
