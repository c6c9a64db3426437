// SPDX-License-Identifier: Apache-2.0
//! In-memory document store.
//!
//! Collections are `RwLock`'d maps, so concurrent readers proceed while
//! a cache-refresh writer replaces documents; last writer wins.

use crate::{DocumentStore, QueryOptions, StoreError};
use netmap_filter::{eval, Predicate};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load collections from a JSON seed file shaped
    /// `{collection: {id: document}}`, replacing existing documents
    /// under the same ids.
    pub fn load_seed(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = std::fs::read(path)?;
        let seed: Collections = serde_json::from_slice(&raw)?;
        let mut loaded = 0;
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        for (collection, docs) in seed {
            let target = collections.entry(collection).or_default();
            loaded += docs.len();
            target.extend(docs);
        }
        Ok(loaded)
    }
}

/// Field ordering for sorting: nulls and missing fields first, then
/// numbers, then everything else by string form.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(xf), Some(yf)) => xf.partial_cmp(&yf).unwrap_or(Ordering::Equal),
            _ => x.to_string().cmp(&y.to_string()),
        },
    }
}

fn doc_version(doc: &Value) -> u64 {
    doc.get("version").and_then(Value::as_u64).unwrap_or(0)
}

impl DocumentStore for MemoryStore {
    fn create(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound(format!("collection {collection}")))?;
        if !docs.contains_key(id) {
            return Err(StoreError::NotFound(format!("document {id}")));
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let mut results: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| eval(predicate, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for key in options.sort.iter().rev() {
            results.sort_by(|a, b| {
                let ordering = compare_field(a.get(&key.field), b.get(&key.field));
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(collapse_key) = &options.collapse_key {
            let mut latest: BTreeMap<String, Value> = BTreeMap::new();
            for doc in results {
                let key = doc
                    .get(collapse_key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match latest.get(&key) {
                    Some(kept) if doc_version(kept) >= doc_version(&doc) => {}
                    _ => {
                        latest.insert(key, doc);
                    }
                }
            }
            results = latest.into_values().collect();
        }

        if let Some(fields) = &options.fields {
            for doc in &mut results {
                if let Value::Object(map) = doc {
                    map.retain(|key, _| fields.contains(key));
                }
            }
        }

        if let Some(limit) = options.limit {
            results.truncate(limit);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::SortKey;
    use serde_json::json;

    fn store_with_versions() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, doc) in [
            ("a1", json!({"datasetId": "d1", "version": 1, "name": "first"})),
            ("a2", json!({"datasetId": "d1", "version": 3, "name": "third"})),
            ("a3", json!({"datasetId": "d1", "version": 2, "name": "second"})),
            ("b1", json!({"datasetId": "d2", "version": 1, "name": "other"})),
        ] {
            store.create("dataset", id, doc).unwrap();
        }
        store
    }

    #[test]
    fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        store.create("dataset", "a1", json!({})).unwrap();
        let err = store.update("dataset", "zz", json!({})).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn collapse_returns_highest_version_per_key() {
        let store = store_with_versions();
        let options = QueryOptions {
            collapse_key: Some("datasetId".into()),
            sort: vec![SortKey::desc("version")],
            ..QueryOptions::default()
        };
        let results = store.query("dataset", &Predicate::True, &options).unwrap();
        assert_eq!(results.len(), 2);
        let d1 = results
            .iter()
            .find(|doc| doc["datasetId"] == "d1")
            .unwrap();
        assert_eq!(d1["version"], 3);
    }

    #[test]
    fn projection_and_limit_shape_results() {
        let store = store_with_versions();
        let options = QueryOptions {
            sort: vec![SortKey::desc("version")],
            fields: Some(vec!["name".into()]),
            limit: Some(2),
            ..QueryOptions::default()
        };
        let results = store.query("dataset", &Predicate::True, &options).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], json!({"name": "third"}));
    }

    #[test]
    fn predicate_narrows_the_collection() {
        let store = store_with_versions();
        let results = store
            .query(
                "dataset",
                &Predicate::field_eq("datasetId", "d2"),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
