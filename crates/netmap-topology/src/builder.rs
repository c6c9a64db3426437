// SPDX-License-Identifier: Apache-2.0
//! Graph construction from flat edge records.
//!
//! Each record carries a name, two (or more) endpoint objects and a
//! meta block. Edges map one-to-one onto records; nodes come from
//! endpoints, deduplicated by name, with cascading group nodes layered
//! above them per the dataset's grouping criteria.

use crate::merge::merge_meta;
use crate::template::{computed_height, computed_width, NodeTemplate};
use crate::TopologyError;
use netmap_model::{dedup_consecutive, Edge, EdgeMeta, LatLon, Node};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn coordinate(endpoint: &Map<String, Value>) -> LatLon {
    [
        number(endpoint.get("latitude")),
        number(endpoint.get("longitude")),
    ]
}

fn capacity(row: &Value) -> Option<i64> {
    match row.get("meta").and_then(|meta| meta.get("circuit_speed")) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Insertion-ordered node set keyed by name.
#[derive(Default)]
struct NodeSet {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodeSet {
    fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.index.get(name).map(|&i| &mut self.nodes[i])
    }

    fn insert(&mut self, node: Node) {
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
    }
}

/// Build the deduplicated node/edge graph from flat edge records.
///
/// Grouping criteria process in reverse so the first listed criterion
/// becomes the outermost group. A criterion an endpoint lacks skips
/// that level only; the chain continues one level shorter. Every
/// resulting node gets its `meta.svg` rendered from `template`, with
/// `computed_width`/`computed_height` parsed back out of the markup.
pub fn build_graph(
    rows: &[Value],
    group_criteria: &[String],
    template: &NodeTemplate,
) -> Result<(Vec<Node>, Vec<Edge>), TopologyError> {
    let mut nodes = NodeSet::default();
    let mut edges = Vec::new();

    for row in rows {
        let Some(endpoints) = row.get("endpoints").and_then(Value::as_array) else {
            tracing::warn!(?row, "edge record without endpoints, skipped");
            continue;
        };
        let endpoints: Vec<&Map<String, Value>> =
            endpoints.iter().filter_map(Value::as_object).collect();
        if endpoints.len() < 2 {
            tracing::warn!(?row, "edge record with fewer than two endpoints, skipped");
            continue;
        }

        let edge_name = row
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut identifiers = Map::new();
        let names: Vec<Value> = endpoints
            .iter()
            .filter_map(|endpoint| endpoint.get("name").cloned())
            .collect();
        identifiers.insert("names".into(), Value::Array(names));
        identifiers.insert(
            "edge_id".into(),
            Value::Array(vec![row.get("id").cloned().unwrap_or(Value::Null)]),
        );
        identifiers.insert(
            "edge_name".into(),
            Value::Array(vec![row.get("name").cloned().unwrap_or(Value::Null)]),
        );

        let raw_coordinates: Vec<LatLon> = endpoints.iter().map(|e| coordinate(e)).collect();
        // Self-loop records legitimately repeat a point; keep the raw
        // path when dedup would drop below two points.
        let deduped = dedup_consecutive(raw_coordinates.clone());
        let coordinates = if deduped.len() >= 2 { deduped } else { raw_coordinates };

        edges.push(Edge {
            name: edge_name,
            coordinates,
            meta: EdgeMeta {
                capacity: capacity(row),
                endpoint_identifiers: identifiers,
            },
        });

        for endpoint in endpoints {
            let Some(leaf_name) = scalar_string(endpoint.get("name")) else {
                tracing::warn!("endpoint without a name, skipped");
                continue;
            };

            let mut working = endpoint.clone();
            working.insert("endpoint_name".into(), Value::String(leaf_name.clone()));

            // Leaf identity is the endpoint name; the first occurrence
            // supplies its meta.
            if nodes.get_mut(&leaf_name).is_none() {
                nodes.insert(Node {
                    name: leaf_name.clone(),
                    coordinate: coordinate(endpoint),
                    meta: working.clone(),
                    children: None,
                });
            }

            let mut last_child = leaf_name;
            for criterion in group_criteria.iter().rev() {
                let Some(group_name) = scalar_string(working.get(criterion.as_str())) else {
                    continue;
                };
                working.insert("endpoint_name".into(), Value::String(group_name.clone()));
                working.insert("group".into(), Value::String(criterion.clone()));

                if let Some(group) = nodes.get_mut(&group_name) {
                    group.meta = merge_meta(&group.meta, &working);
                    let children = group.children.get_or_insert_with(Vec::new);
                    if !children.contains(&last_child) {
                        children.push(last_child);
                    }
                } else {
                    nodes.insert(Node {
                        name: group_name.clone(),
                        coordinate: [0.0, 0.0],
                        meta: working.clone(),
                        children: Some(vec![last_child]),
                    });
                }
                last_child = group_name;
            }
        }
    }

    for node in &mut nodes.nodes {
        let markup = template.render(node)?;
        node.meta.insert(
            "computed_width".into(),
            computed_width(&markup).map_or(Value::Null, Value::from),
        );
        node.meta.insert(
            "computed_height".into(),
            computed_height(&markup).map_or(Value::Null, Value::from),
        );
        node.meta.insert("svg".into(), Value::String(markup));
    }

    Ok((nodes.nodes, edges))
}
