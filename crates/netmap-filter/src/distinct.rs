// SPDX-License-Identifier: Apache-2.0
//! Distinct-value resolution and equality-filter validation.
//!
//! A field's distinct-value set serves UI enumeration and doubles as
//! the legal-value set for validating incoming equality filters. Array
//! shapes flatten recursively before deduplication since the store has
//! no native array aggregation.

use crate::compile::compile;
use crate::eval::eval;
use crate::FilterError;
use netmap_model::{FilterParams, Operator, QueryFilter};
use netmap_schema::{ClassifiedSchema, FieldKind};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

fn flatten_into(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::String(s) if !s.is_empty() => {
            out.insert(s.clone());
        }
        Value::Number(n) => {
            out.insert(n.to_string());
        }
        Value::Bool(b) => {
            out.insert(b.to_string());
        }
        _ => {}
    }
}

/// Distinct sorted values held for `field` across the filtered rows.
///
/// Rows are record documents as the datasource queries them; `filters`
/// compile with templated application always on.
pub fn distinct_values(
    rows: &[Value],
    field: &str,
    schema: &ClassifiedSchema,
    filters: &[QueryFilter],
    params: &FilterParams,
) -> Result<Vec<String>, FilterError> {
    let predicate = compile(filters, schema, params, true)?;
    let class = schema.resolve(field, Operator::Equal);

    let mut values = BTreeSet::new();
    for row in rows.iter().filter(|row| eval(&predicate, row)) {
        match (class.kind, class.child.as_deref()) {
            (FieldKind::NestedObjectArray, Some(child)) => {
                if let Some(Value::Array(items)) = row.get(&class.parent) {
                    for item in items {
                        if let Some(value) = item.get(child) {
                            flatten_into(value, &mut values);
                        }
                    }
                }
            }
            (FieldKind::NestedObject, Some(child)) => {
                if let Some(value) = row.get(&class.parent).and_then(|parent| parent.get(child)) {
                    flatten_into(value, &mut values);
                }
            }
            _ => {
                if let Some(value) = row.get(field) {
                    flatten_into(value, &mut values);
                }
            }
        }
    }
    Ok(values.into_iter().collect())
}

/// Validate that every equality filter's values fall within the legal
/// distinct-value set of its field.
///
/// `distinct_for` fetches the set for one field and is consulted at
/// most once per distinct field across the whole filter list.
/// Substring filters are free text and exempt; templated filters are
/// validated later, once their values resolve.
pub fn validate_equality_filters<F>(
    filters: &[QueryFilter],
    mut distinct_for: F,
) -> Result<(), FilterError>
where
    F: FnMut(&str) -> Result<Vec<String>, FilterError>,
{
    let mut cache: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for filter in filters {
        if filter.templated || filter.value.is_empty() || filter.operator().is_like() {
            continue;
        }
        if !cache.contains_key(&filter.field) {
            let allowed = distinct_for(&filter.field)?;
            cache.insert(filter.field.clone(), allowed);
        }
        let allowed = &cache[&filter.field];
        for value in &filter.value {
            if !allowed.contains(value) {
                return Err(FilterError::Validation {
                    field: filter.field.clone(),
                    allowed: allowed.clone(),
                });
            }
        }
    }
    Ok(())
}
