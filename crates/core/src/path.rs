//! Field paths for nested document access
//!
//! A `FieldPath` names a location inside a document as an ordered sequence of
//! field names. Paths identify both query targets and secondary indices; the
//! index identity string joins the segments with [`INDEX_PATH_SEP`].

use crate::value::{Document, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when a path is flattened into an index identity string.
pub const INDEX_PATH_SEP: &str = "!";

/// An ordered sequence of nested field names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from owned segments.
    pub fn new(segments: Vec<String>) -> Self {
        FieldPath(segments)
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The joined identity string used to name an index on this path.
    pub fn joined(&self) -> String {
        self.0.join(INDEX_PATH_SEP)
    }

    /// Walk the document and return the value at this path, if present.
    ///
    /// Each non-terminal segment must resolve to an `Object`; anything else
    /// ends the walk with `None`.
    pub fn lookup<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = doc.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(segments: Vec<String>) -> Self {
        FieldPath(segments)
    }
}

impl From<&[&str]> for FieldPath {
    fn from(segments: &[&str]) -> Self {
        FieldPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self {
        FieldPath(segments.iter().map(|s| s.to_string()).collect())
    }
}
