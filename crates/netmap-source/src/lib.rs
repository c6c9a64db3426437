// SPDX-License-Identifier: Apache-2.0
//! Datasource contract and registry.
//!
//! A datasource fronts one kind of record backend and exposes the full
//! query/render pipeline over it. Sources register under a fixed name
//! from configuration at startup; an unknown name only surfaces when
//! something actually invokes it.

pub mod sheets;

pub use sheets::SheetCacheSource;

use netmap_filter::FilterError;
use netmap_model::{
    Dataset, FilterParams, Layout, PathLayout, QueryFilter, QueryResult, Topology,
};
use netmap_store::StoreError;
use netmap_topology::{NodeTemplate, TopologyError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Datasource failure.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No datasource registered under the requested name.
    #[error("unknown datasource `{0}`")]
    UnknownSource(String),
    /// The request cannot be served as phrased.
    #[error("misconfigured query: {0}")]
    BadRequest(String),
    /// Snapshot output was requested from a dataset without one.
    #[error("dataset has no snapshot data")]
    NoSnapshot,
    /// Filter compilation or validation failure.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Topology construction failure.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Request-scoped datasource context, parsed off the dataset endpoint
/// string (for the sheet cache: which sheet to query).
pub type Context = BTreeMap<String, String>;

/// Split a dataset endpoint string (`name` or `name?key=value`) into
/// the datasource name and its context.
pub fn parse_endpoint(endpoint: &str) -> (&str, Context) {
    let Some((name, query)) = endpoint.split_once('?') else {
        return (endpoint, Context::new());
    };
    let context = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    (name, context)
}

/// The datasource plugin contract.
pub trait Datasource: Send + Sync {
    /// Run a filtered query and return matching record rows.
    fn query(
        &self,
        filters: &[QueryFilter],
        limit: Option<usize>,
        apply_templated: bool,
        params: &FilterParams,
        context: &Context,
    ) -> Result<QueryResult, SourceError>;

    /// Distinct sorted values for one field over filtered rows.
    fn distinct_values(
        &self,
        field: &str,
        filters: &[QueryFilter],
        params: &FilterParams,
        context: &Context,
    ) -> Result<Vec<String>, SourceError>;

    /// Every synthetic filter-field name this source accepts.
    fn filterable_fields(&self, context: &Context) -> Result<Vec<String>, SourceError>;

    /// Render a dataset into a topology, from live query results or the
    /// dataset's stored snapshot.
    fn render_topology(
        &self,
        dataset: &Dataset,
        path_layout: PathLayout,
        use_snapshot: bool,
        template: &NodeTemplate,
        params: &FilterParams,
        context: &Context,
    ) -> Result<Topology, SourceError>;

    /// Recompute topology positions for the requested layout.
    fn apply_layout(&self, layout: Layout, topology: Topology) -> Topology {
        netmap_layout::apply_layout(layout, topology)
    }

    /// Descriptors for this source's sub-sources, one per queryable
    /// backend instance.
    fn metadata(&self) -> Result<Vec<Value>, SourceError>;

    /// Refresh the source's cached documents from its upstream.
    fn fetch(&self) -> Result<usize, SourceError>;
}

impl std::fmt::Debug for dyn Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Datasource")
    }
}

/// Named datasources, populated at startup from configuration.
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn Datasource>>,
}

impl SourceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under `name`.
    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn Datasource>) {
        self.sources.insert(name.into(), source);
    }

    /// Resolve a source by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Datasource>, SourceError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
    }

    /// Iterate over all registered sources.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Datasource>)> {
        self.sources.iter().map(|(name, source)| (name.as_str(), source))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn endpoint_parsing_splits_name_and_context() {
        let (name, context) = parse_endpoint("sheets?sheet_id=f1&mode=full");
        assert_eq!(name, "sheets");
        assert_eq!(context.get("sheet_id").map(String::as_str), Some("f1"));
        assert_eq!(context.get("mode").map(String::as_str), Some("full"));

        let (name, context) = parse_endpoint("sheets");
        assert_eq!(name, "sheets");
        assert!(context.is_empty());
    }

    #[test]
    fn unknown_sources_fail_lazily_at_resolution() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.get("nope").unwrap_err(),
            SourceError::UnknownSource(_)
        ));
    }
}
