//! Duplicate reference merging
//!
//! Unnamed references whose trimmed bodies are identical get a shared name
//! derived from the body's digest. The first occurrence keeps the body, the
//! rest become self-closing back-references.
//!
//! Names use SHA-256, so they differ from the md5-based `refXXXXXX` names
//! older bots produced for the same body.

use crate::markup::{Markup, PatternMarkup};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ops::Range;

/// Result of a merge pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub text: String,
    pub changed: bool,
    /// Names assigned in this pass, in order of first occurrence
    pub named: Vec<String>,
}

/// Merge duplicate unnamed references using the default markup matcher
pub fn merge_duplicates(text: &str) -> MergeOutcome {
    merge_duplicates_with(&PatternMarkup::default(), text)
}

pub fn merge_duplicates_with<M: Markup>(markup: &M, text: &str) -> MergeOutcome {
    let refs = markup.unnamed_refs(text);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in &refs {
        let body = text[r.body.clone()].trim();
        if !body.is_empty() {
            *counts.entry(body).or_insert(0) += 1;
        }
    }

    let mut named = Vec::new();
    let mut defined: HashMap<&str, String> = HashMap::new();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for r in &refs {
        let raw_body = &text[r.body.clone()];
        let body = raw_body.trim();
        if counts.get(body).copied().unwrap_or(0) < 2 {
            continue;
        }

        match defined.get(body) {
            Some(name) => {
                edits.push((r.span.clone(), format!("<ref name=\"{}\" />", name)));
            }
            None => {
                let name = reference_name(body);
                edits.push((
                    r.span.clone(),
                    format!("<ref name=\"{}\">{}</ref>", name, raw_body),
                ));
                named.push(name.clone());
                defined.insert(body, name);
            }
        }
    }

    if edits.is_empty() {
        return MergeOutcome {
            text: text.to_string(),
            changed: false,
            named,
        };
    }

    MergeOutcome {
        text: splice(text, &edits),
        changed: true,
        named,
    }
}

/// `ref` plus the first six hex digits of the body's SHA-256
pub fn reference_name(trimmed_body: &str) -> String {
    let digest = Sha256::digest(trimmed_body.as_bytes());
    format!("ref{}", hex::encode(&digest[..3]))
}

/// Apply non-overlapping edits given in document order
pub(crate) fn splice(text: &str, edits: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for (span, replacement) in edits {
        out.push_str(&text[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);

    out
}
