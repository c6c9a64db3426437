// SPDX-License-Identifier: Apache-2.0
//! Rendered output: topologies from datasets or ad-hoc queries, and
//! fully normalized maps.
//!
//! Map normalization resolves each layer's `mapjsonUrl` back through
//! the dataset output pipeline and applies the map's per-dataset
//! override rules to the resulting topology document.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::params::RawParams;
use crate::routes::{validate_overrides, version_selector};
use crate::settings::{GEOGRAPHIC_NODE_TEMPLATE, LOGICAL_NODE_TEMPLATE};
use crate::state::AppState;
use crate::svg;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use netmap_model::{
    Dataset, DatasetQuery, DatasetRevision, Datatype, FilterParams, Layout, LayerConfiguration,
    Map, MapConfiguration, MapOverrides, MapRevision, OutputFormat, PathLayout, Scope, Topology,
};
use netmap_source::parse_endpoint;
use netmap_store::VersionSelector;
use netmap_topology::{apply_overrides, NodeTemplate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

#[allow(clippy::expect_used)]
static MAPJSON_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r".+/output/dataset/(?P<dataset_id>[A-Za-z0-9]+)/(?P<layout>[^/?]+)/(?P<datatype>[^/?]+)/?(?:\?(?P<query>.*))?$",
    )
    .expect("mapjson url pattern")
});

fn parse_variant<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

/// Resolve the node-template markup for a render: a stored template by
/// id when requested, otherwise the layout's built-in default.
fn template_source(
    state: &AppState,
    template_id: Option<&str>,
    geographic: bool,
) -> Result<String, ApiError> {
    match template_id {
        Some(id) if !id.is_empty() => Ok(state.catalog().get_template(id)?.template),
        _ => {
            let (key, fallback) = if geographic {
                ("GEOGRAPHIC", GEOGRAPHIC_NODE_TEMPLATE)
            } else {
                ("LOGICAL", LOGICAL_NODE_TEMPLATE)
            };
            Ok(state.node_template(key).unwrap_or(fallback).to_string())
        }
    }
}

fn path_layout_for(layout: Layout) -> PathLayout {
    match layout {
        Layout::Geographic => PathLayout::cardinal(),
        Layout::Logical => PathLayout::linear(),
    }
}

fn render_dataset(
    state: &AppState,
    dataset: &Dataset,
    layout: Layout,
    use_snapshot: bool,
    template_id: Option<&str>,
    params: &FilterParams,
) -> Result<Topology, ApiError> {
    let (name, context) = parse_endpoint(&dataset.query.endpoint);
    let source = state.registry().get(name)?;
    let markup = template_source(state, template_id, layout == Layout::Geographic)?;
    let template = NodeTemplate::new(&markup)?;
    let topology = source.render_topology(
        dataset,
        path_layout_for(layout),
        use_snapshot,
        &template,
        params,
        &context,
    )?;
    Ok(source.apply_layout(layout, topology))
}

/// The dataset output pipeline shared by the direct route and map
/// normalization.
fn dataset_topology(
    state: &AppState,
    dataset_id: &str,
    layout: Layout,
    datatype: Datatype,
    version: VersionSelector,
    template_id: Option<&str>,
    params: &FilterParams,
) -> Result<Topology, ApiError> {
    let dataset = state
        .catalog()
        .get_datasets(Some(dataset_id), version)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ApiError::not_found(format!("No dataset found with dataset_id = {dataset_id}"))
        })?;
    render_dataset(
        state,
        &dataset,
        layout,
        datatype == Datatype::Snapshot,
        template_id,
        params,
    )
}

fn ephemeral_dataset(query: DatasetQuery) -> Dataset {
    Dataset {
        dataset_id: "ephemeral".to_string(),
        name: "ephemeral".to_string(),
        version: 1,
        last_updated_by: "n/a".to_string(),
        last_updated_on: Utc::now(),
        query,
        results: None,
    }
}

fn topology_response(topology: &Topology, format: OutputFormat) -> Result<Response, ApiError> {
    match format {
        OutputFormat::Json => Ok(Json(topology).into_response()),
        OutputFormat::Svg => Ok(([(CONTENT_TYPE, "image/svg+xml")],
            svg::render_topology_svg(topology)?)
            .into_response()),
    }
}

pub async fn dataset_output(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((dataset_id, layout, datatype, format)): Path<(String, Layout, Datatype, OutputFormat)>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    auth.require(Scope::Read)?;
    let params = RawParams(raw);
    let version = version_selector(&params)?;
    let topology = dataset_topology(
        &state,
        &dataset_id,
        layout,
        datatype,
        version,
        params.first("template"),
        &params.filter_params(),
    )?;
    topology_response(&topology, format)
}

/// Raw query results for an unsaved dataset revision.
pub async fn query_raw(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(raw): Query<Vec<(String, String)>>,
    Json(revision): Json<DatasetRevision>,
) -> Result<Json<Vec<Value>>, ApiError> {
    auth.require(Scope::Write)?;
    let params = RawParams(raw);
    let (name, context) = parse_endpoint(&revision.query.endpoint);
    let source = state.registry().get(name)?;
    let result = source.query(
        &revision.query.filters,
        None,
        true,
        &params.filter_params(),
        &context,
    )?;
    Ok(Json(result.data))
}

/// Live topology for an unsaved dataset revision.
pub async fn query_patch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(layout): Path<Layout>,
    Query(raw): Query<Vec<(String, String)>>,
    Json(revision): Json<DatasetRevision>,
) -> Result<Json<Topology>, ApiError> {
    auth.require(Scope::Write)?;
    let params = RawParams(raw);
    let dataset = ephemeral_dataset(revision.query);
    let topology = render_dataset(
        &state,
        &dataset,
        layout,
        false,
        params.first("template"),
        &params.filter_params(),
    )?;
    Ok(Json(topology))
}

/// Live topology for a query built entirely from GET parameters.
pub async fn query_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(layout): Path<Layout>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Topology>, ApiError> {
    auth.require(Scope::Write)?;
    let params = RawParams(raw);
    let endpoint = params
        .first("datasource")
        .ok_or_else(|| ApiError::bad_request("missing `datasource` parameter"))?
        .to_string();
    let filters = params.decode_filters(&["datasource", "template", "version"]);
    let dataset = ephemeral_dataset(DatasetQuery {
        endpoint,
        filters,
        node_deduplication_field: None,
        node_group_criteria: None,
        node_group_layout: None,
    });
    let topology = render_dataset(
        &state,
        &dataset,
        layout,
        false,
        params.first("template"),
        &params.filter_params(),
    )?;
    Ok(Json(topology))
}

/// Resolve every layer's `mapjsonUrl` into an inline topology document
/// and apply the map's override rules. Layers whose URL does not point
/// back at a dataset output route are skipped with a warning.
fn normalize_layers(
    state: &AppState,
    layers: &mut [LayerConfiguration],
    overrides: &BTreeMap<String, MapOverrides>,
) -> Result<(), ApiError> {
    for layer in layers.iter_mut() {
        let Some(url) = layer.mapjson_url.clone() else {
            continue;
        };
        let Some(caps) = MAPJSON_URL.captures(&url) else {
            tracing::warn!(layer = %layer.name, url = %url, "unknown mapjsonUrl, skipping");
            continue;
        };
        let dataset_id = &caps["dataset_id"];
        let (Some(layout), Some(datatype)) = (
            parse_variant::<Layout>(&caps["layout"]),
            parse_variant::<Datatype>(&caps["datatype"]),
        ) else {
            tracing::warn!(layer = %layer.name, url = %url, "unrecognized layout or datatype in mapjsonUrl, skipping");
            continue;
        };
        let query_pairs: Vec<(String, String)> = caps
            .name("query")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let query_params = RawParams(query_pairs);
        let version = version_selector(&query_params)?;

        let topology = dataset_topology(
            state,
            dataset_id,
            layout,
            datatype,
            version,
            query_params.first("template"),
            &query_params.filter_params(),
        )?;
        let mut document = serde_json::to_value(&topology)
            .map_err(|err| ApiError::internal(format!("topology serialization failed: {err}")))?;
        if let Some(rules) = overrides.get(dataset_id) {
            apply_overrides(&mut document, rules);
        }
        layer.mapjson = Some(document);
    }
    Ok(())
}

fn map_response(map: &Map, format: OutputFormat) -> Result<Response, ApiError> {
    match format {
        OutputFormat::Json => Ok(Json(map).into_response()),
        OutputFormat::Svg => {
            let markup = svg::render_map_svg(&map.configuration.layers)?;
            Ok((
                [
                    (CONTENT_TYPE, "image/svg+xml".to_string()),
                    (
                        CONTENT_DISPOSITION,
                        format!("inline; filename \"{}.svg\"", map.name),
                    ),
                ],
                markup,
            )
                .into_response())
        }
    }
}

fn load_normalized_map(
    state: &AppState,
    map_id: &str,
    version: VersionSelector,
    public_only: bool,
) -> Result<Map, ApiError> {
    let mut map = state
        .catalog()
        .get_maps(Some(map_id), version, public_only)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(format!("No map found with id = {map_id}")))?;
    let overrides = map.overrides.clone();
    normalize_layers(state, &mut map.configuration.layers, &overrides)?;
    Ok(map)
}

pub async fn map_output(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((map_id, format)): Path<(String, OutputFormat)>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    auth.require(Scope::Read)?;
    let version = version_selector(&RawParams(raw))?;
    let map = load_normalized_map(&state, &map_id, version, false)?;
    map_response(&map, format)
}

/// Published-map configuration, served without authentication.
pub async fn public_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<MapConfiguration>, ApiError> {
    let version = version_selector(&RawParams(raw))?;
    let map = load_normalized_map(&state, &map_id, version, true)?;
    Ok(Json(map.configuration))
}

pub async fn public_map_typed(
    State(state): State<AppState>,
    Path((map_id, format)): Path<(String, OutputFormat)>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let version = version_selector(&RawParams(raw))?;
    let map = load_normalized_map(&state, &map_id, version, true)?;
    map_response(&map, format)
}

/// Normalize an unsaved map revision so the editor can preview it.
pub async fn map_patch(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut revision): Json<MapRevision>,
) -> Result<Json<MapRevision>, ApiError> {
    auth.require(Scope::Write)?;
    validate_overrides(&revision.overrides)?;
    let overrides = revision.overrides.clone();
    normalize_layers(&state, &mut revision.configuration.layers, &overrides)?;
    Ok(Json(revision))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn mapjson_urls_parse_into_their_parts() {
        let caps = MAPJSON_URL
            .captures("https://maps.example.net/api/v1/output/dataset/aB3xY12/geographic/snapshot/?template=t1x9a2b")
            .unwrap();
        assert_eq!(&caps["dataset_id"], "aB3xY12");
        assert_eq!(parse_variant::<Layout>(&caps["layout"]), Some(Layout::Geographic));
        assert_eq!(
            parse_variant::<Datatype>(&caps["datatype"]),
            Some(Datatype::Snapshot)
        );
        assert_eq!(caps.name("query").map(|m| m.as_str()), Some("template=t1x9a2b"));
    }

    #[test]
    fn non_dataset_urls_do_not_match() {
        assert!(MAPJSON_URL
            .captures("https://example.net/some/other/thing")
            .is_none());
    }

    #[test]
    fn layouts_pick_their_path_hint() {
        assert_eq!(path_layout_for(Layout::Geographic), PathLayout::cardinal());
        assert_eq!(path_layout_for(Layout::Logical), PathLayout::linear());
    }
}
