// SPDX-License-Identifier: Apache-2.0
//! Logical layout.
//!
//! The geographic layout is a pass-through of stored coordinates. The
//! logical layout recomputes positions: a directed graph is built from
//! each edge's endpoint names, laid out left to right in layered ranks,
//! and the resulting positions are reprojected into a compact lat/lon
//! window so the graph stays undistorted on a standard map projection.
//!
//! The whole pipeline is deterministic: ranks come from breadth-first
//! depth over insertion-ordered nodes, in-rank ordering is insertion
//! order, and separations are fixed constants.

use netmap_model::{dedup_consecutive, LatLon, Layout, Topology};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, VecDeque};

const MAX_LAT_BOUND: f64 = 30.0; // small bounds: avoid distortion on map projection
const MAX_LON_BOUND: f64 = 60.0;

const RANK_SEP: f64 = 100.0;
const NODE_SEP: f64 = 50.0;

/// Apply the requested layout to a topology.
pub fn apply_layout(layout: Layout, topology: Topology) -> Topology {
    match layout {
        Layout::Geographic => topology,
        Layout::Logical => logical_layout(topology),
    }
}

struct Positions {
    by_name: HashMap<String, (f64, f64)>,
    urx: f64,
    ury: f64,
}

impl Positions {
    fn project(&self, x: f64, y: f64) -> LatLon {
        let lat = MAX_LAT_BOUND * (y / self.ury) - MAX_LAT_BOUND / 2.0;
        let lon = MAX_LON_BOUND * (x / self.urx) - MAX_LON_BOUND / 2.0;
        [lat, lon]
    }

    fn projected(&self, name: &str) -> Option<LatLon> {
        self.by_name.get(name).map(|&(x, y)| self.project(x, y))
    }
}

/// Rank every graph node by breadth-first depth. Traversal starts from
/// the in-degree-zero roots; graphs that are all cycle get the earliest
/// inserted unvisited node as a fallback root, so ranking terminates on
/// any input.
fn rank_nodes(graph: &DiGraph<String, ()>) -> HashMap<NodeIndex, usize> {
    let mut ranks: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|&index| {
            graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
                .next()
                .is_none()
        })
        .collect();
    for &root in &queue {
        ranks.insert(root, 0);
    }

    loop {
        while let Some(current) = queue.pop_front() {
            let next_rank = ranks[&current] + 1;
            for neighbor in graph.neighbors(current) {
                if !ranks.contains_key(&neighbor) {
                    ranks.insert(neighbor, next_rank);
                    queue.push_back(neighbor);
                }
            }
        }
        match graph.node_indices().find(|index| !ranks.contains_key(index)) {
            Some(unvisited) => {
                ranks.insert(unvisited, 0);
                queue.push_back(unvisited);
            }
            None => break,
        }
    }
    ranks
}

fn layout_positions(topology: &Topology) -> Positions {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: HashMap<String, NodeIndex> = HashMap::new();

    let mut node_index = |graph: &mut DiGraph<String, ()>, name: &str| {
        *indices
            .entry(name.to_string())
            .or_insert_with(|| graph.add_node(name.to_string()))
    };

    for edge in &topology.edges {
        let names = edge.meta.endpoint_names();
        if names.len() < 2 {
            tracing::warn!(edge = %edge.name, "edge without two endpoint names, not laid out");
            continue;
        }
        let a = node_index(&mut graph, &names[0]);
        let b = node_index(&mut graph, &names[1]);
        graph.add_edge(a, b, ());
    }

    let ranks = rank_nodes(&graph);

    // Stable in-rank ordering: nodes keep their insertion order.
    let mut rank_counts: HashMap<usize, usize> = HashMap::new();
    let mut by_name = HashMap::new();
    let mut urx: f64 = 0.0;
    let mut ury: f64 = 0.0;
    for index in graph.node_indices() {
        let rank = ranks.get(&index).copied().unwrap_or(0);
        let slot = rank_counts.entry(rank).or_insert(0);
        let x = rank as f64 * RANK_SEP;
        let y = *slot as f64 * NODE_SEP;
        *slot += 1;
        urx = urx.max(x);
        ury = ury.max(y);
        by_name.insert(graph[index].clone(), (x, y));
    }

    Positions {
        by_name,
        urx: if urx > 0.0 { urx } else { 1.0 },
        ury: if ury > 0.0 { ury } else { 1.0 },
    }
}

/// Recompute every position in the topology with the layered layout.
///
/// Nodes absent from the edge graph (group nodes in particular) keep
/// their prior coordinate. Edge paths are rebuilt through a midpoint
/// and deduplicated of consecutive repeats; a self-loop keeps its
/// non-consecutive revisit of the endpoint.
pub fn logical_layout(mut topology: Topology) -> Topology {
    let positions = layout_positions(&topology);

    for node in &mut topology.nodes {
        if let Some(coordinate) = positions.projected(&node.name) {
            node.coordinate = coordinate;
        }
    }

    for edge in &mut topology.edges {
        let names = edge.meta.endpoint_names();
        if names.len() < 2 {
            continue;
        }
        let (Some(&(ax, ay)), Some(&(bx, by))) =
            (positions.by_name.get(&names[0]), positions.by_name.get(&names[1]))
        else {
            continue;
        };
        let path = if names[0] == names[1] {
            // Loop out and back so the circuit stays visible.
            vec![
                positions.project(ax, ay),
                positions.project(ax + RANK_SEP / 2.0, ay + NODE_SEP / 2.0),
                positions.project(ax, ay),
            ]
        } else {
            vec![
                positions.project(ax, ay),
                positions.project((ax + bx) / 2.0, (ay + by) / 2.0),
                positions.project(bx, by),
            ]
        };
        edge.coordinates = dedup_consecutive(path);
    }

    topology
}
