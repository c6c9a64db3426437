// SPDX-License-Identifier: Apache-2.0
//! HTTP route assembly and shared query-parameter helpers.

pub mod documents;
pub mod output;
pub mod sources;

use crate::error::ApiError;
use crate::params::RawParams;
use crate::state::AppState;
use axum::routing::{get, patch, post};
use axum::Router;
use netmap_model::MapOverrides;
use netmap_store::VersionSelector;
use std::collections::BTreeMap;
use tower_http::trace::TraceLayer;

/// Build the full daemon router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/datasets", get(documents::list_datasets))
        .route("/dataset", post(documents::create_dataset))
        .route(
            "/dataset/id/:dataset_id",
            get(documents::get_dataset).put(documents::update_dataset),
        )
        .route("/maps", get(documents::list_maps))
        .route("/map", post(documents::create_map))
        .route(
            "/map/id/:map_id",
            get(documents::get_map).put(documents::update_map),
        )
        .route("/map/id/:map_id/publish", post(documents::publish_map))
        .route("/templates", get(documents::list_templates))
        .route("/template", post(documents::create_template))
        .route(
            "/template/id/:template_id",
            get(documents::get_template).put(documents::update_template),
        )
        .route(
            "/userdata",
            get(documents::get_userdata)
                .post(documents::create_userdata)
                .put(documents::update_userdata),
        )
        .route("/sources", get(sources::list_sources))
        .route("/source/:name/records", get(sources::records))
        .route("/source/:name/types/:field", get(sources::distinct))
        .route("/source/:name/fields", get(sources::fields))
        .route(
            "/output/dataset/:dataset_id/:layout/:datatype/:format",
            get(output::dataset_output),
        )
        .route("/output/query/raw", patch(output::query_raw))
        .route(
            "/output/query/:layout",
            get(output::query_get).patch(output::query_patch),
        )
        .route("/output/map", patch(output::map_patch))
        .route("/output/map/:map_id/:format", get(output::map_output))
        .route("/public/output/map/:map_id", get(output::public_map))
        .route(
            "/public/output/map/:map_id/:format",
            get(output::public_map_typed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `?version=latest|all|N`, defaulting to latest.
pub fn version_selector(params: &RawParams) -> Result<VersionSelector, ApiError> {
    match params.first("version") {
        None => Ok(VersionSelector::Latest),
        Some(raw) => raw.parse().map_err(ApiError::bad_request),
    }
}

/// `?expected_version=N` for optimistic update checks.
pub fn expected_version(params: &RawParams) -> Result<Option<u64>, ApiError> {
    params
        .first("expected_version")
        .map(|raw| {
            raw.parse()
                .map_err(|_| ApiError::bad_request(format!("invalid expected_version `{raw}`")))
        })
        .transpose()
}

/// Reject incoming map overrides whose rules carry no state. Checked on
/// every accepted revision; a stateless `add` or `override` would patch
/// a null entity into the rendered topology.
pub fn validate_overrides(overrides: &BTreeMap<String, MapOverrides>) -> Result<(), ApiError> {
    for (dataset_id, rules) in overrides {
        rules
            .validate()
            .map_err(|reason| ApiError::bad_request(format!("dataset {dataset_id}: {reason}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::StatusCode;
    use netmap_model::{OverrideOp, OverrideRule};

    #[test]
    fn stateless_override_rules_are_rejected_with_400() {
        let mut rules = MapOverrides::default();
        rules.nodes.insert(
            "DENV".into(),
            OverrideRule {
                operation: OverrideOp::Add,
                state: None,
                render: Some(true),
            },
        );
        let mut overrides = BTreeMap::new();
        overrides.insert("aB3xY12".to_string(), rules);

        let err = validate_overrides(&overrides).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        overrides.clear();
        assert!(validate_overrides(&overrides).is_ok());
    }
}
