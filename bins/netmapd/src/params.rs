// SPDX-License-Identifier: Apache-2.0
//! Query-string helpers.
//!
//! Filter fields arrive as plain query parameters with operator
//! suffixes (`circuit_type_name_not_equal=Dark+Fiber`), repeated for
//! multiple values, alongside reserved parameters like `limit` and
//! datasource context keys. Handlers pull the raw pair list and split
//! it here.

use netmap_model::{FilterParams, Operator, QueryFilter};
use netmap_schema::decode_field;
use netmap_source::Context;
use std::collections::BTreeMap;

/// Raw query pairs in request order.
pub struct RawParams(pub Vec<(String, String)>);

impl RawParams {
    /// First value supplied for `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every pair as a multi-valued parameter set, for templated filter
    /// resolution.
    pub fn filter_params(&self) -> FilterParams {
        let mut params = FilterParams::new();
        for (key, value) in &self.0 {
            params.push(key.clone(), value.clone());
        }
        params
    }

    /// Decode the non-reserved pairs into query filters, grouping
    /// repeated keys into one multi-valued filter.
    pub fn decode_filters(&self, reserved: &[&str]) -> Vec<QueryFilter> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in &self.0 {
            if reserved.contains(&key.as_str()) {
                continue;
            }
            grouped.entry(key.clone()).or_default().push(value.clone());
        }
        grouped
            .into_iter()
            .map(|(key, values)| {
                let (field, operator) = decode_field(&key);
                match operator {
                    Operator::Equal => QueryFilter::equal(field, values),
                    other => QueryFilter::with_operator(field, other, values),
                }
            })
            .collect()
    }

    /// Split pairs into datasource context (keys in `context_keys`) and
    /// the rest.
    pub fn split_context(&self, context_keys: &[String]) -> (Context, RawParams) {
        let mut context = Context::new();
        let mut rest = Vec::new();
        for (key, value) in &self.0 {
            if context_keys.contains(key) {
                context.insert(key.clone(), value.clone());
            } else {
                rest.push((key.clone(), value.clone()));
            }
        }
        (context, RawParams(rest))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn params() -> RawParams {
        RawParams(vec![
            ("limit".into(), "5".into()),
            ("sheet_id".into(), "f1".into()),
            ("location_tags".into(), "ESnet5".into()),
            ("location_tags".into(), "ESnet6".into()),
            ("circuit_type_name_not_equal".into(), "Dark Fiber".into()),
        ])
    }

    #[test]
    fn repeated_keys_group_into_one_filter() {
        let filters = params().decode_filters(&["limit", "sheet_id"]);
        assert_eq!(filters.len(), 2);
        let tags = filters.iter().find(|f| f.field == "location_tags").unwrap();
        assert_eq!(tags.value, vec!["ESnet5", "ESnet6"]);
        let not_equal = filters
            .iter()
            .find(|f| f.field == "circuit_type_name")
            .unwrap();
        assert_eq!(not_equal.operator, Some(Operator::NotEqual));
    }

    #[test]
    fn context_splits_off_by_key() {
        let (context, rest) = params().split_context(&["sheet_id".to_string()]);
        assert_eq!(context.get("sheet_id").map(String::as_str), Some("f1"));
        assert!(rest.first("sheet_id").is_none());
        assert_eq!(rest.first("limit"), Some("5"));
    }
}
