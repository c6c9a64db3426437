// SPDX-License-Identifier: Apache-2.0
//! Normalized graph topology produced by the topology builder and
//! consumed by layout/output rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A `[lat, lon]` coordinate pair.
pub type LatLon = [f64; 2];

/// Output layout selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Use stored/query-provided lat/lon positions.
    Geographic,
    /// Recompute positions with the hierarchical layout engine.
    Logical,
}

/// Whether output is rendered from live query results or a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    /// Re-run the dataset query.
    Live,
    /// Use the result rows captured on the dataset revision.
    Snapshot,
}

/// Output encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON topology document.
    Json,
    /// SVG markup.
    Svg,
}

/// Edge path rendering hint carried on the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathLayout {
    /// Curve family, e.g. `curveCardinal` or `curveLinear`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Curve tension.
    pub tension: f64,
}

impl PathLayout {
    /// Default path hint for geographic output.
    pub fn cardinal() -> Self {
        Self {
            kind: "curveCardinal".to_string(),
            tension: 0.6,
        }
    }

    /// Default path hint for logical output.
    pub fn linear() -> Self {
        Self {
            kind: "curveLinear".to_string(),
            tension: 0.6,
        }
    }
}

/// A topology node. A node with a non-empty `children` list is a group
/// node; its coordinate is assigned by the layout engine, not supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node key within the topology.
    pub name: String,
    /// `[lat, lon]` position.
    pub coordinate: LatLon,
    /// Merged record attributes, including the rendered `svg` markup.
    pub meta: Map<String, Value>,
    /// Names of member nodes when this is a group node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

impl Node {
    /// True when this node groups other nodes.
    pub fn is_group(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Edge metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMeta {
    /// Circuit capacity, from the record's speed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    /// Identifier lists keyed by kind (`names`, `edge_id`, `edge_name`).
    pub endpoint_identifiers: Map<String, Value>,
}

impl EdgeMeta {
    /// Ordered endpoint names recorded for layout graph construction.
    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoint_identifiers
            .get("names")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A topology edge with a multi-point path.
///
/// `coordinates` never holds two identical consecutive points, but may
/// legitimately revisit a point non-consecutively (self-loop circuits).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge display name.
    pub name: String,
    /// Path points, at least two.
    pub coordinates: Vec<LatLon>,
    /// Edge metadata.
    pub meta: EdgeMeta,
}

/// A rendered topology: deduplicated nodes plus edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// All nodes, leaves and groups.
    pub nodes: Vec<Node>,
    /// All edges.
    pub edges: Vec<Edge>,
    /// Rendering layer name.
    #[serde(default = "default_layer")]
    pub layer: String,
    /// Topology display name (usually the dataset name).
    pub name: String,
    /// Edge path rendering hint.
    #[serde(rename = "pathLayout")]
    pub path_layout: PathLayout,
}

fn default_layer() -> String {
    "tail".to_string()
}

/// Collapse runs of identical consecutive points while preserving
/// legitimate non-consecutive repeats.
pub fn dedup_consecutive(points: Vec<LatLon>) -> Vec<LatLon> {
    let mut out: Vec<LatLon> = Vec::with_capacity(points.len());
    for point in points {
        if out.last() == Some(&point) {
            continue;
        }
        out.push(point);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_collapses_only_adjacent_duplicates() {
        let points = vec![[1.0, 2.0], [1.0, 2.0], [3.0, 4.0], [3.0, 4.0], [1.0, 2.0]];
        assert_eq!(
            dedup_consecutive(points),
            vec![[1.0, 2.0], [3.0, 4.0], [1.0, 2.0]]
        );
    }

    #[test]
    fn group_node_detection() {
        let node = Node {
            name: "R1".into(),
            coordinate: [0.0, 0.0],
            meta: Map::new(),
            children: Some(vec!["X".into()]),
        };
        assert!(node.is_group());
    }

    #[test]
    fn endpoint_names_round_trip() {
        let mut ids = Map::new();
        ids.insert(
            "names".into(),
            serde_json::json!(["sunn-cr1", "sacr-cr2"]),
        );
        let meta = EdgeMeta {
            capacity: Some(100),
            endpoint_identifiers: ids,
        };
        assert_eq!(meta.endpoint_names(), vec!["sunn-cr1", "sacr-cr2"]);
    }
}
