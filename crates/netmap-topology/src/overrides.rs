// SPDX-License-Identifier: Apache-2.0
//! User-authored topology patches.
//!
//! Overrides apply onto the serialized topology's entity lists, keyed
//! by entity name. Application never fails: a missing target turns an
//! `override` into an append and a `delete` into a no-op.

use netmap_model::{MapOverrides, OverrideOp, OverrideRule};
use serde_json::Value;
use std::collections::BTreeMap;

/// Apply one rule set onto an entity list.
pub fn apply_rules(entities: &mut Vec<Value>, rules: &BTreeMap<String, OverrideRule>) {
    for (identifier, rule) in rules {
        if rule.render == Some(false) {
            continue;
        }
        let existing = entities
            .iter()
            .position(|entity| entity.get("name").and_then(Value::as_str) == Some(identifier));
        tracing::debug!(identifier, operation = ?rule.operation, ?existing, "applying override");

        match (existing, rule.operation) {
            (None, OverrideOp::Add | OverrideOp::Override) => {
                entities.push(rule.state.clone().unwrap_or(Value::Null));
            }
            (None, OverrideOp::Delete) => {}
            (Some(index), OverrideOp::Override) => {
                entities[index] = rule.state.clone().unwrap_or(Value::Null);
            }
            (Some(_), OverrideOp::Add) => {}
            (Some(index), OverrideOp::Delete) => {
                entities.remove(index);
            }
        }
    }
}

/// Apply a layer's node and edge overrides onto a serialized topology.
pub fn apply_overrides(topology: &mut Value, overrides: &MapOverrides) {
    for (key, rules) in [("nodes", &overrides.nodes), ("edges", &overrides.edges)] {
        if let Some(Value::Array(entities)) = topology.get_mut(key) {
            apply_rules(entities, rules);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn topology() -> Value {
        json!({
            "nodes": [
                {"name": "SUNN", "coordinate": [37.0, -122.0]},
                {"name": "SACR", "coordinate": [38.5, -121.5]},
            ],
            "edges": [
                {"name": "SUNN--SACR", "coordinates": [[37.0, -122.0], [38.5, -121.5]]},
            ],
        })
    }

    fn rule(operation: OverrideOp, state: Option<Value>) -> OverrideRule {
        OverrideRule {
            operation,
            state,
            render: Some(true),
        }
    }

    #[test]
    fn override_of_missing_entity_appends() {
        let mut topo = topology();
        let mut overrides = MapOverrides::default();
        overrides.nodes.insert(
            "DENV".into(),
            rule(OverrideOp::Override, Some(json!({"name": "DENV"}))),
        );
        apply_overrides(&mut topo, &overrides);
        assert_eq!(topo["nodes"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn delete_of_missing_entity_is_a_noop() {
        let mut topo = topology();
        let mut overrides = MapOverrides::default();
        overrides.nodes.insert("DENV".into(), rule(OverrideOp::Delete, None));
        apply_overrides(&mut topo, &overrides);
        assert_eq!(topo["nodes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn add_of_existing_entity_is_a_noop() {
        let mut topo = topology();
        let mut overrides = MapOverrides::default();
        overrides.nodes.insert(
            "SUNN".into(),
            rule(OverrideOp::Add, Some(json!({"name": "SUNN", "meta": {}}))),
        );
        apply_overrides(&mut topo, &overrides);
        let nodes = topo["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].get("meta").is_none());
    }

    #[test]
    fn override_replaces_and_delete_removes() {
        let mut topo = topology();
        let mut overrides = MapOverrides::default();
        overrides.nodes.insert(
            "SUNN".into(),
            rule(OverrideOp::Override, Some(json!({"name": "SUNN", "renamed": true}))),
        );
        overrides
            .edges
            .insert("SUNN--SACR".into(), rule(OverrideOp::Delete, None));
        apply_overrides(&mut topo, &overrides);
        assert_eq!(topo["nodes"][0]["renamed"], json!(true));
        assert!(topo["edges"].as_array().unwrap().is_empty());
    }

    #[test]
    fn unrendered_rules_are_skipped() {
        let mut topo = topology();
        let mut overrides = MapOverrides::default();
        overrides.nodes.insert(
            "SUNN".into(),
            OverrideRule {
                operation: OverrideOp::Delete,
                state: None,
                render: Some(false),
            },
        );
        apply_overrides(&mut topo, &overrides);
        assert_eq!(topo["nodes"].as_array().unwrap().len(), 2);
    }
}
