// SPDX-License-Identifier: Apache-2.0
//! Query filter vocabulary used both at the API boundary and by the
//! filter compiler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter operator, encoded on the wire as a field-name suffix
/// (`_not_like`, `_like`, `_not_equal`; equality carries no suffix).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Exclude rows matching any of the given substrings.
    NotLike,
    /// Substring match against any of the given values.
    Like,
    /// Exclude rows matching any of the given values.
    NotEqual,
    /// Exact match against any of the given values (the default).
    #[default]
    #[serde(alias = "")]
    Equal,
}

impl Operator {
    /// The field-name suffix for this operator, without the leading `_`.
    /// Equality is the default and has no suffix.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Operator::NotLike => Some("not_like"),
            Operator::Like => Some("like"),
            Operator::NotEqual => Some("not_equal"),
            Operator::Equal => None,
        }
    }

    /// The three non-default operators, in suffix-registration order.
    pub fn modifiers() -> [Operator; 3] {
        [Operator::NotLike, Operator::Like, Operator::NotEqual]
    }

    /// True for the substring-matching operators, which are exempt from
    /// distinct-value validation.
    pub fn is_like(self) -> bool {
        matches!(self, Operator::Like | Operator::NotLike)
    }

    /// True for the negating operators.
    pub fn is_negating(self) -> bool {
        matches!(self, Operator::NotEqual | Operator::NotLike)
    }
}

/// One filter criterion against a datasource record field.
///
/// An empty `value` list means "no constraint" and the filter is skipped
/// entirely during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Synthetic filter field name (possibly `parent_child`).
    pub field: String,
    /// Match operator; `None` means equality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    /// Values to match; joined per the operator's logic rules.
    pub value: Vec<String>,
    /// When set, `value` is ignored and the actual values are resolved
    /// from the request-scoped [`FilterParams`] at compile time.
    #[serde(default)]
    pub templated: bool,
}

impl QueryFilter {
    /// Equality filter over the given values.
    pub fn equal(field: impl Into<String>, value: Vec<String>) -> Self {
        Self {
            field: field.into(),
            operator: None,
            value,
            templated: false,
        }
    }

    /// Filter with an explicit operator.
    pub fn with_operator(field: impl Into<String>, operator: Operator, value: Vec<String>) -> Self {
        Self {
            field: field.into(),
            operator: Some(operator),
            value,
            templated: false,
        }
    }

    /// The effective operator (equality when unset).
    pub fn operator(&self) -> Operator {
        self.operator.unwrap_or_default()
    }
}

/// Request-scoped parameter source for templated filters.
///
/// Passed explicitly through the call chain; concurrent requests never
/// share an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams(BTreeMap<String, Vec<String>>);

impl FilterParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value for `field` (fields are multi-valued).
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(value.into());
    }

    /// All values supplied for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Iterate over all `(field, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl FromIterator<(String, Vec<String>)> for FilterParams {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
