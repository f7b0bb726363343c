//! Governance notes.
//!
//! Privileged-control hints pulled from constraint text and field names.
//! Notes are independent of the declaration's category.

use serde::{Deserialize, Serialize};

use crate::extract::RawDeclaration;

pub const GOVERNANCE_KEYWORDS: &[&str] = &["admin", "migration", "multisig", "timelock", "dao"];

/// Where a note's matched text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteOrigin {
    Constraint,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceNote {
    pub keyword: String,
    pub struct_name: String,
    pub file: String,
    pub line: usize,
    /// Constraint expression or field name containing the keyword.
    pub matched: String,
    pub origin: NoteOrigin,
}

impl GovernanceNote {
    /// Deduplication key used by the assembler.
    pub fn key(&self) -> (&str, &str) {
        (&self.keyword, &self.struct_name)
    }
}

/// One note per (keyword, matched text) pair. Constraints are scanned first,
/// then field names, each in source order.
pub fn governance_notes(decl: &RawDeclaration) -> Vec<GovernanceNote> {
    let constraint_hits = decl
        .all_constraints()
        .map(|c| (c.expression(), NoteOrigin::Constraint));
    let field_hits = decl
        .fields
        .iter()
        .filter(|f| !f.name.is_empty())
        .map(|f| (f.name.clone(), NoteOrigin::Field));

    let mut notes = Vec::new();
    for (text, origin) in constraint_hits.chain(field_hits) {
        let lowered = text.to_lowercase();
        for keyword in GOVERNANCE_KEYWORDS {
            if lowered.contains(keyword) {
                notes.push(GovernanceNote {
                    keyword: keyword.to_string(),
                    struct_name: decl.name.clone(),
                    file: decl.file.clone(),
                    line: decl.line,
                    matched: text.clone(),
                    origin,
                });
            }
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_source;
    use crate::scan::SourceUnit;

    fn decl(src: &str) -> RawDeclaration {
        extract_source(&SourceUnit::new("lib.rs", src))
            .declarations
            .remove(0)
    }

    #[test]
    fn test_constraint_and_field_notes() {
        let d = decl(
            "#[derive(Accounts)]\npub struct Migrate<'info> {\n    #[account(mut, has_one = admin_authority)]\n    pub config: Account<'info, Config>,\n    pub migration_authority: Signer<'info>,\n}",
        );
        let notes = governance_notes(&d);
        let got: Vec<(&str, &str, NoteOrigin)> = notes
            .iter()
            .map(|n| (n.keyword.as_str(), n.matched.as_str(), n.origin))
            .collect();
        assert_eq!(
            got,
            vec![
                ("admin", "has_one = admin_authority", NoteOrigin::Constraint),
                ("migration", "migration_authority", NoteOrigin::Field),
            ]
        );
        assert!(notes.iter().all(|n| n.struct_name == "Migrate"));
    }

    #[test]
    fn test_no_notes_for_plain_struct() {
        let d = decl("#[account]\npub struct Global { pub initialized: bool, pub authority: Pubkey }");
        assert!(governance_notes(&d).is_empty());
    }

    #[test]
    fn test_multiple_keywords_in_one_text() {
        let d = decl("struct S { dao_multisig: Pubkey }");
        let keywords: Vec<String> = governance_notes(&d).into_iter().map(|n| n.keyword).collect();
        assert_eq!(keywords, vec!["multisig", "dao"]);
    }
}
