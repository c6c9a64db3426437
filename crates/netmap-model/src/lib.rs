// SPDX-License-Identifier: Apache-2.0
//! Core data model shared across netmap crates.
//! Pure data: query filters, topologies, versioned documents, override rules.

pub mod config;
pub mod document;
pub mod filter;
pub mod topology;
pub mod user;

pub use document::{
    Dataset, DatasetQuery, DatasetRevision, LayerConfiguration, Map, MapConfiguration,
    MapOverrides, MapRevision, NewTemplate, OverrideOp, OverrideRule, QueryResult, Template,
    UserData, UserDataRevision,
};
pub use filter::{FilterParams, Operator, QueryFilter};
pub use topology::{
    dedup_consecutive, Datatype, Edge, EdgeMeta, LatLon, Layout, Node, OutputFormat, PathLayout,
    Topology,
};
pub use user::{Scope, User};
