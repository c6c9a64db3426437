// SPDX-License-Identifier: Apache-2.0
//! Shared daemon state handed to every request handler.

use netmap_model::User;
use netmap_source::SourceRegistry;
use netmap_store::Catalog;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable shared state: catalog, datasource registry, token table
/// and the default node templates.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    catalog: Catalog,
    registry: SourceRegistry,
    tokens: BTreeMap<String, User>,
    node_templates: BTreeMap<String, String>,
}

impl AppState {
    pub fn new(
        catalog: Catalog,
        registry: SourceRegistry,
        tokens: BTreeMap<String, User>,
        node_templates: BTreeMap<String, String>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                catalog,
                registry,
                tokens,
                node_templates,
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.inner.registry
    }

    pub fn token_user(&self, token: &str) -> Option<&User> {
        self.inner.tokens.get(token)
    }

    pub fn node_template(&self, name: &str) -> Option<&str> {
        self.inner.node_templates.get(name).map(String::as_str)
    }
}
