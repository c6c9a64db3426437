// SPDX-License-Identifier: Apache-2.0
//! Predicate evaluation against JSON documents.
//!
//! Comparison semantics follow SQL NULL rules: a missing or null field
//! satisfies no comparator, negated ones included. Numbers and bools
//! compare through their canonical string form since filter values are
//! always string tokens.

use crate::predicate::{lookup, Cmp, Predicate};
use serde_json::Value;
use std::borrow::Cow;

fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn compare(found: Option<&Value>, cmp: Cmp, value: &str) -> bool {
    let Some(text) = found.and_then(scalar_text) else {
        return false;
    };
    match cmp {
        Cmp::Eq => text == value,
        Cmp::Ne => text != value,
        Cmp::Like => text.contains(value),
        Cmp::NotLike => !text.contains(value),
    }
}

/// Evaluate a predicate against one document.
pub fn eval(predicate: &Predicate, doc: &Value) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::Compare { path, cmp, value } => compare(lookup(doc, path), *cmp, value),
        Predicate::Exists { path, inner } => match lookup(doc, path) {
            Some(Value::Array(items)) => items.iter().any(|item| eval(inner, item)),
            _ => false,
        },
        Predicate::All(preds) => preds.iter().all(|p| eval(p, doc)),
        Predicate::Any(preds) => preds.iter().any(|p| eval(p, doc)),
        Predicate::Not(inner) => !eval(inner, doc),
    }
}
