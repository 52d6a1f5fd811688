//! Triple type for knowledge graphs.
//!
//! A triple is an opaque (head, relation, tail) statement. The strings are
//! IRIs or literal text; nothing here interprets them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (head, relation, tail) triple.
///
/// # Example
///
/// ```rust
/// use strata_core::Triple;
///
/// let triple = Triple::new("Apple", "founded_by", "Steve Jobs");
/// assert_eq!(triple.head, "Apple");
/// assert_eq!(triple.relation, "founded_by");
/// assert_eq!(triple.tail, "Steve Jobs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// Head entity (subject in RDF terminology).
    pub head: String,
    /// Relation (predicate in RDF terminology).
    pub relation: String,
    /// Tail entity or literal (object in RDF terminology).
    pub tail: String,
}

impl Triple {
    /// Create a new triple.
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }

    /// Whether the tail looks like literal text rather than an IRI.
    ///
    /// IRIs are recognised by a `scheme://` prefix or a `urn:` prefix.
    pub fn tail_is_literal(&self) -> bool {
        !looks_like_iri(&self.tail)
    }
}

fn looks_like_iri(s: &str) -> bool {
    if s.starts_with("urn:") {
        return true;
    }
    match s.find("://") {
        Some(pos) if pos > 0 => s[..pos]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.head, self.relation, self.tail)
    }
}

impl<H, R, T> From<(H, R, T)> for Triple
where
    H: Into<String>,
    R: Into<String>,
    T: Into<String>,
{
    fn from((head, relation, tail): (H, R, T)) -> Self {
        Self::new(head, relation, tail)
    }
}
