// SPDX-License-Identifier: Apache-2.0
//! Topology construction and patching.
//!
//! [`builder`] turns flat edge records into a deduplicated node/edge
//! graph with cascading group nodes, [`template`] renders each node's
//! visual markup, and [`overrides`] applies user-authored patches onto
//! a rendered topology.

pub mod builder;
pub mod merge;
pub mod overrides;
pub mod template;

pub use builder::build_graph;
pub use merge::merge_meta;
pub use overrides::apply_overrides;
pub use template::NodeTemplate;

use thiserror::Error;

/// Topology construction failure.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The node template failed to compile or render. Fatal: a broken
    /// visual asset must surface, never render a partial map.
    #[error("node template error: {0}")]
    TemplateRender(String),
}
