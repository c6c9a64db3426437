// SPDX-License-Identifier: Apache-2.0
//! SVG assembly for maps and topologies.
//!
//! Lat/lon coordinates scale to pixels with the Y axis inverted (SVG
//! lays out top-down, maps bottom-up). The viewport grows to fit every
//! node plus half its rendered markup and the layer's node width as
//! padding. Edge paths render as quadratic curves for `curveCardinal`
//! layers and relative line segments otherwise.

use crate::error::ApiError;
use handlebars::Handlebars;
use netmap_model::{LayerConfiguration, Topology};
use serde::Serialize;
use serde_json::Value;

const LATLNG_SCALE_FACTOR: f64 = 11.0;

const SVG_TEMPLATE: &str = r#"<svg viewBox="{{viewbox.min_x}} {{viewbox.min_y}} {{viewbox.dx}} {{viewbox.dy}}" xmlns="http://www.w3.org/2000/svg" xmlns:xhtml="http://www.w3.org/1999/xhtml">
<style>
foreignObject, text { font-family:Arial,Helvetica,sans-serif; }
</style>
{{#each layers}}
{{#each groups}}
<g transform="translate({{x}}, {{y}})"><g fill="{{../color}}" stroke-width="{{../node_stroke_width}}" stroke="black">{{{svg}}}</g></g>
{{/each}}
{{#each edges}}
<path d="{{path}}" stroke="{{../color}}" fill="none" stroke-width="{{../edge_width}}" />
{{/each}}
{{#each nodes}}
<g transform="translate({{x}}, {{y}})"><g fill="{{../color}}" stroke-width="{{../node_stroke_width}}" stroke="black">{{{svg}}}</g></g>
{{/each}}
{{/each}}
</svg>"#;

#[derive(Debug, Default, Serialize)]
struct ViewBox {
    min_x: f64,
    min_y: f64,
    dx: f64,
    dy: f64,
    #[serde(skip)]
    max_x: f64,
    #[serde(skip)]
    max_y: f64,
}

#[derive(Debug, Serialize)]
struct NodeRender {
    x: f64,
    y: f64,
    svg: String,
}

#[derive(Debug, Serialize)]
struct EdgeRender {
    path: String,
}

#[derive(Debug, Serialize)]
struct LayerRender {
    color: String,
    edge_width: f64,
    node_stroke_width: f64,
    groups: Vec<NodeRender>,
    nodes: Vec<NodeRender>,
    edges: Vec<EdgeRender>,
}

/// Build an SVG path string from `[y, x]` pixel points.
fn compute_path(points: &[[f64; 2]], quadratic: bool) -> String {
    let mut output = Vec::new();
    if quadratic {
        let mut rest = points;
        if let Some((first, tail)) = rest.split_first() {
            output.push(format!("M {} {}", first[1], first[0]));
            rest = tail;
        }
        // Consume control/endpoint pairs; a lone trailing point gets a
        // straight segment.
        while rest.len() > 1 {
            let control = rest[0];
            let endpoint = rest[1];
            output.push(format!(
                "Q {} {} {} {}",
                control[1], control[0], endpoint[1], endpoint[0]
            ));
            rest = &rest[2..];
        }
        if let Some(end) = rest.first() {
            output.push(format!("L {} {}", end[1], end[0]));
        }
    } else {
        let mut prev: Option<[f64; 2]> = None;
        for point in points {
            match prev {
                None => output.push(format!("M {} {}", point[1], point[0])),
                Some(p) => output.push(format!("l {} {}", point[1] - p[1], point[0] - p[0])),
            }
            prev = Some(*point);
        }
    }
    output.join(" ")
}

fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

fn meta_number(node: &Value, key: &str) -> f64 {
    number(node.get("meta").and_then(|meta| meta.get(key)))
}

fn pixel_point(coordinate: &Value) -> [f64; 2] {
    let lat = number(coordinate.get(0));
    let lon = number(coordinate.get(1));
    [lat * LATLNG_SCALE_FACTOR * -1.0, lon * LATLNG_SCALE_FACTOR]
}

fn is_group(node: &Value) -> bool {
    node.get("children")
        .and_then(Value::as_array)
        .is_some_and(|children| !children.is_empty())
}

/// Project one topology document into a renderable layer, growing the
/// shared viewport as nodes land.
fn layer_render(
    topology: &Value,
    color: &str,
    edge_width: f64,
    node_width: f64,
    viewbox: &mut ViewBox,
) -> LayerRender {
    let mut groups = Vec::new();
    let mut nodes = Vec::new();

    let empty = Vec::new();
    let node_values = topology
        .get("nodes")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    for node in node_values {
        let [y, x] = pixel_point(node.get("coordinate").unwrap_or(&Value::Null));
        let half_height = meta_number(node, "computed_height") * 0.5;
        let half_width = meta_number(node, "computed_width") * 0.5;
        viewbox.min_y = viewbox.min_y.min(y - half_height - node_width);
        viewbox.max_y = viewbox.max_y.max(y + half_height + node_width);
        viewbox.min_x = viewbox.min_x.min(x - half_width - node_width);
        viewbox.max_x = viewbox.max_x.max(x + half_width + node_width);

        let rendered = NodeRender {
            x,
            y,
            svg: node
                .get("meta")
                .and_then(|meta| meta.get("svg"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        if is_group(node) {
            groups.push(rendered);
        } else {
            nodes.push(rendered);
        }
    }

    let quadratic = topology
        .get("pathLayout")
        .and_then(|p| p.get("type"))
        .and_then(Value::as_str)
        == Some("curveCardinal");
    let edges = topology
        .get("edges")
        .and_then(Value::as_array)
        .unwrap_or(&empty)
        .iter()
        .map(|edge| {
            let points: Vec<[f64; 2]> = edge
                .get("coordinates")
                .and_then(Value::as_array)
                .unwrap_or(&empty)
                .iter()
                .map(pixel_point)
                .collect();
            EdgeRender {
                path: compute_path(&points, quadratic),
            }
        })
        .collect();

    viewbox.dx = viewbox.max_x - viewbox.min_x;
    viewbox.dy = viewbox.max_y - viewbox.min_y;

    LayerRender {
        color: color.to_string(),
        edge_width,
        node_stroke_width: 1.0,
        groups,
        nodes,
        edges,
    }
}

fn render_layers(layers: &[LayerRender], viewbox: &ViewBox) -> Result<String, ApiError> {
    let mut registry = Handlebars::new();
    registry
        .register_template_string("svg", SVG_TEMPLATE)
        .map_err(|err| ApiError::internal(format!("svg template failed to compile: {err}")))?;
    Ok(registry.render(
        "svg",
        &serde_json::json!({ "layers": layers, "viewbox": viewbox }),
    )?)
}

/// Render a normalized map (every layer's `mapjson` resolved to a
/// topology document) into SVG markup.
pub fn render_map_svg(layers: &[LayerConfiguration]) -> Result<String, ApiError> {
    let mut viewbox = ViewBox::default();
    let mut rendered = Vec::new();
    for layer in layers {
        let Some(topology) = &layer.mapjson else {
            tracing::warn!(layer = %layer.name, "layer has no resolved mapjson, not rendered");
            continue;
        };
        rendered.push(layer_render(
            topology,
            &layer.color,
            layer.edge_width,
            layer.node_width,
            &mut viewbox,
        ));
    }
    render_layers(&rendered, &viewbox)
}

/// Render a bare topology as a single default-styled layer.
pub fn render_topology_svg(topology: &Topology) -> Result<String, ApiError> {
    let value = serde_json::to_value(topology)
        .map_err(|err| ApiError::internal(format!("topology serialization failed: {err}")))?;
    let mut viewbox = ViewBox::default();
    let layer = layer_render(&value, "#005ea2", 1.5, 8.0, &mut viewbox);
    render_layers(&[layer], &viewbox)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn linear_paths_use_relative_segments() {
        let points = [[0.0, 0.0], [10.0, 20.0], [10.0, 30.0]];
        assert_eq!(compute_path(&points, false), "M 0 0 l 20 10 l 10 0");
    }

    #[test]
    fn quadratic_paths_pair_controls_with_endpoints() {
        let points = [[0.0, 0.0], [5.0, 10.0], [0.0, 20.0]];
        assert_eq!(compute_path(&points, true), "M 0 0 Q 10 5 20 0");
    }

    #[test]
    fn quadratic_paths_close_odd_tails_with_a_line() {
        let points = [[0.0, 0.0], [5.0, 10.0], [0.0, 20.0], [8.0, 25.0]];
        assert_eq!(compute_path(&points, true), "M 0 0 Q 10 5 20 0 L 25 8");
    }

    #[test]
    fn y_axis_inverts_and_scales() {
        assert_eq!(pixel_point(&json!([2.0, 3.0])), [-22.0, 33.0]);
    }

    #[test]
    fn groups_and_leaves_split_and_viewbox_grows() {
        let topology = json!({
            "nodes": [
                {
                    "name": "A",
                    "coordinate": [1.0, 1.0],
                    "meta": {"svg": "<g/>", "computed_width": 30, "computed_height": 20},
                },
                {
                    "name": "R1",
                    "coordinate": [0.0, 0.0],
                    "meta": {"svg": "<g/>"},
                    "children": ["A"],
                },
            ],
            "edges": [],
            "pathLayout": {"type": "curveLinear", "tension": 0.6},
        });
        let mut viewbox = ViewBox::default();
        let layer = layer_render(&topology, "#000", 1.0, 5.0, &mut viewbox);
        assert_eq!(layer.nodes.len(), 1);
        assert_eq!(layer.groups.len(), 1);
        // A lands at y = -11, x = 11; padded by half markup + node width.
        assert_eq!(viewbox.min_y, -26.0);
        assert_eq!(viewbox.max_x, 31.0);
    }

    #[test]
    fn full_render_emits_markup() {
        let topology = json!({
            "nodes": [{"name": "A", "coordinate": [0.0, 0.0], "meta": {"svg": "<rect/>"}}],
            "edges": [{"name": "e", "coordinates": [[0.0, 0.0], [1.0, 1.0]],
                       "meta": {"endpoint_identifiers": {}}}],
            "pathLayout": {"type": "curveCardinal", "tension": 0.6},
        });
        let mut viewbox = ViewBox::default();
        let layer = layer_render(&topology, "#005ea2", 1.5, 8.0, &mut viewbox);
        let markup = render_layers(&[layer], &viewbox).unwrap();
        assert!(markup.starts_with("<svg viewBox="));
        assert!(markup.contains("<rect/>"));
        assert!(markup.contains("stroke=\"#005ea2\""));
    }
}
