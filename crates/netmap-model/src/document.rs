// SPDX-License-Identifier: Apache-2.0
//! Versioned documents stored in the document store.
//!
//! Mutations never update in place: each one appends a new row with a
//! higher `version`, and "latest" is the row with the maximum version
//! for a logical id.

use crate::filter::QueryFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use std::collections::BTreeMap;

/// Generic query result wrapper: total match count plus (possibly
/// limited) data rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Number of rows matching before any limit.
    pub count: usize,
    /// Result rows.
    pub data: Vec<Value>,
}

/// The stored half of a dataset: which datasource to ask and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetQuery {
    /// Datasource endpoint string, `name` or `name?key=value`.
    pub endpoint: String,
    /// Filters applied on every evaluation of this dataset.
    pub filters: Vec<QueryFilter>,
    /// Field used to deduplicate endpoint nodes.
    #[serde(default = "default_dedup_field")]
    pub node_deduplication_field: Option<String>,
    /// Cascading grouping criteria, outermost group listed first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_group_criteria: Option<Vec<String>>,
    /// Optional layout hint for group nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_group_layout: Option<String>,
}

fn default_dedup_field() -> Option<String> {
    Some("location_name".to_string())
}

/// A stored dataset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// 7-character alphanumeric logical id.
    pub dataset_id: String,
    /// Display name.
    pub name: String,
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Username of the principal who wrote this version.
    pub last_updated_by: String,
    /// Timestamp of this version.
    pub last_updated_on: DateTime<Utc>,
    /// The query this dataset evaluates.
    pub query: DatasetQuery,
    /// Snapshot of the query results captured at update time.
    #[serde(default)]
    pub results: Option<Vec<Value>>,
}

/// The client-supplied portion of a dataset create/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRevision {
    /// Display name.
    pub name: String,
    /// The query to store.
    pub query: DatasetQuery,
}

/// Override operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideOp {
    /// Remove the entity if present.
    Delete,
    /// Append the entity if absent.
    Add,
    /// Replace the entity, appending if absent.
    Override,
}

/// A user-authored patch applied onto a rendered topology entity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// What to do with the matching entity.
    pub operation: OverrideOp,
    /// Replacement entity state; required unless deleting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Rules with `render == false` are skipped entirely.
    #[serde(default)]
    pub render: Option<bool>,
}

impl OverrideRule {
    /// Check the `state`-required-unless-delete invariant.
    pub fn validate(&self) -> Result<(), String> {
        let empty = match &self.state {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };
        if self.operation != OverrideOp::Delete && empty {
            return Err("state cannot be empty unless operation is delete".to_string());
        }
        Ok(())
    }
}

/// Node and edge override rules for one dataset layer, keyed by entity
/// name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapOverrides {
    /// Node overrides.
    pub nodes: BTreeMap<String, OverrideRule>,
    /// Edge overrides.
    pub edges: BTreeMap<String, OverrideRule>,
}

impl MapOverrides {
    /// Validate every rule, naming the first offending entity.
    pub fn validate(&self) -> Result<(), String> {
        for (kind, rules) in [("node", &self.nodes), ("edge", &self.edges)] {
            for (identifier, rule) in rules {
                rule.validate()
                    .map_err(|reason| format!("{kind} override `{identifier}`: {reason}"))?;
            }
        }
        Ok(())
    }
}

/// Per-layer display settings plus the layer's topology source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfiguration {
    /// Whether the layer renders at all.
    pub visible: bool,
    /// Layer display name.
    pub name: String,
    /// Stroke/fill color.
    pub color: String,
    /// Edge stroke width.
    pub edge_width: f64,
    /// Path offset for parallel edges.
    pub path_offset: f64,
    /// Node padding used for viewport accounting.
    pub node_width: f64,
    /// When set, `mapjson_url` points at a dataset output endpoint.
    pub json_from_url: bool,
    /// Inline topology JSON (filled from `mapjson_url` during output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapjson: Option<Value>,
    /// Topology source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapjson_url: Option<String>,
    /// Any remaining layer options (thresholds, animation flags, ...).
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

/// Map display configuration. Only the parts the output renderer needs
/// are typed; the remainder passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfiguration {
    /// Layer list, bottom first.
    pub layers: Vec<LayerConfiguration>,
    /// Background color.
    #[serde(default)]
    pub background: Option<String>,
    /// Remaining viewport/legend/tileset options.
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

/// A stored map version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    /// 7-character alphanumeric logical id.
    pub map_id: String,
    /// Display name.
    pub name: String,
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Override rules keyed by dataset id.
    pub overrides: BTreeMap<String, MapOverrides>,
    /// Display configuration.
    pub configuration: MapConfiguration,
    /// Username of the principal who wrote this version.
    pub last_updated_by: String,
    /// Timestamp of this version.
    pub last_updated_on: DateTime<Utc>,
    /// Whether the map is visible without authentication.
    #[serde(default)]
    pub public: Option<bool>,
}

/// The client-supplied portion of a map create/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRevision {
    /// Display name.
    pub name: String,
    /// Override rules keyed by dataset id.
    pub overrides: BTreeMap<String, MapOverrides>,
    /// Display configuration.
    pub configuration: MapConfiguration,
}

/// A stored node template version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// 7-character alphanumeric logical id.
    pub template_id: String,
    /// Display name.
    pub name: String,
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Username of the principal who wrote this version.
    pub last_updated_by: String,
    /// Timestamp of this version.
    pub last_updated_on: DateTime<Utc>,
    /// Template source.
    pub template: String,
}

/// The client-supplied portion of a template create/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    /// Display name.
    pub name: String,
    /// Template source.
    pub template: String,
}

/// Per-user UI state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataRevision {
    /// Favorite object ids keyed by object kind.
    pub favorites: BTreeMap<String, Vec<String>>,
    /// Recently edited object ids keyed by object kind.
    pub last_edited: BTreeMap<String, Vec<String>>,
}

/// Per-user UI state as stored, keyed by username.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Owning username.
    pub username: String,
    /// Favorite object ids keyed by object kind.
    pub favorites: BTreeMap<String, Vec<String>>,
    /// Recently edited object ids keyed by object kind.
    pub last_edited: BTreeMap<String, Vec<String>>,
}
