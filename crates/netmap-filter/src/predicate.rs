// SPDX-License-Identifier: Apache-2.0
//! Storage-query predicate tree.
//!
//! The tree is the storage collaborator's query language: stores
//! evaluate it against their documents with [`crate::eval`]. It stays
//! deliberately small. Comparisons hold string tokens (filter values
//! arrive as strings) and paths are key chains into a JSON document.

use serde_json::Value;

/// Comparison operator on one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Exact string equality.
    Eq,
    /// String inequality.
    Ne,
    /// Substring containment.
    Like,
    /// Negated substring containment.
    NotLike,
}

/// A query predicate over a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every document.
    True,
    /// Compare the scalar at `path` against `value`.
    ///
    /// An empty `path` compares the document itself, which only makes
    /// sense inside an [`Exists`] quantifier where the document is one
    /// array element.
    ///
    /// [`Exists`]: Predicate::Exists
    Compare {
        /// Key chain from the document root.
        path: Vec<String>,
        /// Comparison operator.
        cmp: Cmp,
        /// Right-hand value token.
        value: String,
    },
    /// True when some element of the array at `path` satisfies `inner`.
    /// Paths inside `inner` are relative to the array element.
    Exists {
        /// Key chain from the document root to the array.
        path: Vec<String>,
        /// Element predicate.
        inner: Box<Predicate>,
    },
    /// Conjunction.
    All(Vec<Predicate>),
    /// Disjunction.
    Any(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Equality comparison on a single top-level field.
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Compare {
            path: vec![field.into()],
            cmp: Cmp::Eq,
            value: value.into(),
        }
    }

    /// Conjunction that collapses trivial shapes.
    pub fn all(mut predicates: Vec<Predicate>) -> Self {
        predicates.retain(|p| *p != Predicate::True);
        match predicates.len() {
            0 => Predicate::True,
            1 => predicates.remove(0),
            _ => Predicate::All(predicates),
        }
    }

    /// Disjunction that collapses the single-branch shape.
    pub fn any(mut predicates: Vec<Predicate>) -> Self {
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Predicate::Any(predicates)
        }
    }

    /// Conjoin another predicate onto this one.
    pub fn and(self, other: Predicate) -> Self {
        Predicate::all(vec![self, other])
    }

    /// Re-root the predicate under an extra leading path segment.
    ///
    /// Used by stores that nest the record inside an envelope document:
    /// a predicate compiled against record fields becomes one against
    /// the envelope. Paths inside `Exists` quantifiers are
    /// element-relative and stay untouched.
    pub fn prefixed(self, root: &str) -> Self {
        match self {
            Predicate::True => Predicate::True,
            Predicate::Compare { mut path, cmp, value } => {
                path.insert(0, root.to_string());
                Predicate::Compare { path, cmp, value }
            }
            Predicate::Exists { mut path, inner } => {
                path.insert(0, root.to_string());
                Predicate::Exists { path, inner }
            }
            Predicate::All(preds) => {
                Predicate::All(preds.into_iter().map(|p| p.prefixed(root)).collect())
            }
            Predicate::Any(preds) => {
                Predicate::Any(preds.into_iter().map(|p| p.prefixed(root)).collect())
            }
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.prefixed(root))),
        }
    }
}

/// Follow a key chain into a JSON value.
pub(crate) fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = doc;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn all_collapses_trivial_shapes() {
        assert_eq!(Predicate::all(vec![]), Predicate::True);
        let single = Predicate::field_eq("a", "1");
        assert_eq!(Predicate::all(vec![single.clone()]), single.clone());
        assert_eq!(
            Predicate::all(vec![Predicate::True, single.clone()]),
            single
        );
    }

    #[test]
    fn prefixed_leaves_existential_interiors_alone() {
        let pred = Predicate::Exists {
            path: vec!["endpoints".into()],
            inner: Box::new(Predicate::field_eq("location_name", "SUNN")),
        };
        match pred.prefixed("edge") {
            Predicate::Exists { path, inner } => {
                assert_eq!(path, vec!["edge".to_string(), "endpoints".to_string()]);
                assert_eq!(*inner, Predicate::field_eq("location_name", "SUNN"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
