//! Heuristic protocol classification.
//!
//! Each declaration is scored against every category of a
//! [`SignatureTable`]: the score is the number of distinct keywords found as
//! case-insensitive substrings of the declaration name, field names, field
//! types and constraint text. The highest score wins, ties go to the
//! category listed first, and a zero score everywhere is
//! [`Category::Unclassified`].

mod governance;
mod params;
mod signatures;

pub use governance::{governance_notes, GovernanceNote, NoteOrigin, GOVERNANCE_KEYWORDS};
pub use params::{
    access_parameter, constant_parameters, declaration_parameters, Parameter, NUMERIC_RULES,
};
pub use signatures::{Category, SignatureTable};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::extract::RawDeclaration;

/// Result of classifying one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// Keywords of the winning category that matched, in table order.
    pub keywords: Vec<String>,
    pub score: usize,
}

impl Classification {
    pub fn unclassified() -> Self {
        Self {
            category: Category::Unclassified,
            keywords: Vec::new(),
            score: 0,
        }
    }
}

/// A declaration together with its classification, governance notes and
/// DeFi parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedDeclaration {
    pub declaration: RawDeclaration,
    pub classification: Classification,
    pub notes: Vec<GovernanceNote>,
    pub params: Vec<Parameter>,
}

/// Scores declarations against a shared signature table.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: Arc<SignatureTable>,
}

impl Classifier {
    pub fn new(table: Arc<SignatureTable>) -> Self {
        Self { table }
    }

    /// Pick the best category for `decl`.
    pub fn classify(&self, decl: &RawDeclaration) -> Classification {
        let haystack = search_text(decl);

        let mut best = Classification::unclassified();
        for (category, keywords) in self.table.entries() {
            let matched: Vec<String> = keywords
                .iter()
                .filter(|k| haystack.iter().any(|h| h.contains(k.as_str())))
                .cloned()
                .collect();
            if matched.len() > best.score {
                best = Classification {
                    category,
                    score: matched.len(),
                    keywords: matched,
                };
            }
        }
        best
    }

    /// Classify and annotate a declaration.
    pub fn annotate(&self, declaration: RawDeclaration) -> ClassifiedDeclaration {
        let classification = self.classify(&declaration);
        let notes = governance_notes(&declaration);
        let params = declaration_parameters(&declaration);
        ClassifiedDeclaration {
            declaration,
            classification,
            notes,
            params,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(SignatureTable::default()))
    }
}

/// Lowercased texts a keyword may appear in.
fn search_text(decl: &RawDeclaration) -> Vec<String> {
    let mut texts = vec![decl.name.to_lowercase()];
    for field in &decl.fields {
        texts.push(field.name.to_lowercase());
        texts.push(field.ty.to_lowercase());
    }
    for constraint in decl.all_constraints() {
        texts.push(constraint.kind.to_lowercase());
        texts.push(constraint.raw.to_lowercase());
    }
    texts
}
