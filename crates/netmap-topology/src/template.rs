// SPDX-License-Identifier: Apache-2.0
//! Node visual templates.
//!
//! A node template is a handlebars source string instantiated once per
//! node with the node's own attributes. Render failure is fatal and
//! logged with the offending template source.

use crate::TopologyError;
use handlebars::Handlebars;
use netmap_model::Node;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

const TEMPLATE_NAME: &str = "node";

#[allow(clippy::expect_used)]
static DATA_WIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-width="(\d+)""#).expect("data-width pattern"));
#[allow(clippy::expect_used)]
static DATA_HEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-height="(\d+)""#).expect("data-height pattern"));

fn parse_attr(markup: &str, pattern: &Regex) -> Option<i64> {
    pattern
        .captures(markup)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A compiled node template.
pub struct NodeTemplate {
    registry: Handlebars<'static>,
    source: String,
}

impl NodeTemplate {
    /// Compile a template source string.
    pub fn new(source: &str) -> Result<Self, TopologyError> {
        let mut registry = Handlebars::new();
        if let Err(error) = registry.register_template_string(TEMPLATE_NAME, source) {
            tracing::error!(template = %source, %error, "node template failed to compile");
            return Err(TopologyError::TemplateRender(error.to_string()));
        }
        Ok(Self {
            registry,
            source: source.to_string(),
        })
    }

    /// Render the template with one node's attributes.
    pub fn render(&self, node: &Node) -> Result<String, TopologyError> {
        let endpoint_name = node.meta.get("endpoint_name").cloned();
        let context = json!({
            "name": node.name,
            "coordinate": node.coordinate,
            "meta": node.meta,
            "children": node.children,
            "endpoint_name": endpoint_name,
        });
        self.registry
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| {
                tracing::error!(template = %self.source, %error, "node template failed to render");
                TopologyError::TemplateRender(error.to_string())
            })
    }
}

/// Pixel width declared by the rendered markup's `data-width`
/// attribute.
pub fn computed_width(markup: &str) -> Option<i64> {
    parse_attr(markup, &DATA_WIDTH)
}

/// Pixel height declared by the rendered markup's `data-height`
/// attribute.
pub fn computed_height(markup: &str) -> Option<i64> {
    parse_attr(markup, &DATA_HEIGHT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::Map;

    fn node() -> Node {
        let mut meta = Map::new();
        meta.insert("endpoint_name".into(), json!("SUNN"));
        meta.insert("site".into(), json!("sunnyvale"));
        Node {
            name: "SUNN".into(),
            coordinate: [37.4, -122.0],
            meta,
            children: None,
        }
    }

    #[test]
    fn renders_node_attributes() {
        let template =
            NodeTemplate::new(r#"<g data-width="30" data-height="30">{{endpoint_name}}</g>"#)
                .unwrap();
        let markup = template.render(&node()).unwrap();
        assert!(markup.contains("SUNN"));
        assert_eq!(computed_width(&markup), Some(30));
        assert_eq!(computed_height(&markup), Some(30));
    }

    #[test]
    fn broken_template_is_fatal() {
        assert!(NodeTemplate::new("{{#if}}").is_err());
    }

    #[test]
    fn missing_dimension_attributes_yield_none() {
        assert_eq!(computed_width("<g></g>"), None);
    }
}
