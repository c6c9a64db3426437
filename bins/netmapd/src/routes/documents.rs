// SPDX-License-Identifier: Apache-2.0
//! CRUD routes for datasets, maps, templates and user data.
//!
//! Reads take `?version=latest|all|N`; updates take an optional
//! `?expected_version=N` optimistic check. Every mutation appends a new
//! document version rather than rewriting in place.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::params::RawParams;
use crate::routes::{expected_version, validate_overrides, version_selector};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use netmap_model::{
    Dataset, DatasetRevision, FilterParams, Map, MapRevision, NewTemplate, Scope, Template,
    UserData, UserDataRevision,
};
use netmap_source::parse_endpoint;

pub async fn list_datasets(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Dataset>>, ApiError> {
    auth.require(Scope::Read)?;
    let version = version_selector(&RawParams(raw))?;
    Ok(Json(state.catalog().get_datasets(None, version)?))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dataset_id): Path<String>,
) -> Result<Json<Dataset>, ApiError> {
    auth.require(Scope::Read)?;
    Ok(Json(state.catalog().get_dataset(&dataset_id)?))
}

pub async fn create_dataset(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(revision): Json<DatasetRevision>,
) -> Result<Json<Dataset>, ApiError> {
    let user = auth.require(Scope::Write)?;
    Ok(Json(state.catalog().create_dataset(revision, user)?))
}

/// Update re-runs the revision's query so the new version carries a
/// fresh result snapshot. Templated filters stay unresolved here; they
/// bind at output time.
pub async fn update_dataset(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dataset_id): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
    Json(revision): Json<DatasetRevision>,
) -> Result<Json<Dataset>, ApiError> {
    let user = auth.require(Scope::Write)?;
    let expected = expected_version(&RawParams(raw))?;
    let (name, context) = parse_endpoint(&revision.query.endpoint);
    let source = state.registry().get(name)?;
    let results = source
        .query(
            &revision.query.filters,
            None,
            false,
            &FilterParams::new(),
            &context,
        )?
        .data;
    Ok(Json(state.catalog().update_dataset(
        &dataset_id,
        revision,
        Some(results),
        user,
        expected,
    )?))
}

pub async fn list_maps(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Map>>, ApiError> {
    auth.require(Scope::Read)?;
    let version = version_selector(&RawParams(raw))?;
    Ok(Json(state.catalog().get_maps(None, version, false)?))
}

pub async fn get_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(map_id): Path<String>,
) -> Result<Json<Map>, ApiError> {
    auth.require(Scope::Read)?;
    Ok(Json(state.catalog().get_map(&map_id, false)?))
}

pub async fn create_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(revision): Json<MapRevision>,
) -> Result<Json<Map>, ApiError> {
    let user = auth.require(Scope::Write)?;
    validate_overrides(&revision.overrides)?;
    Ok(Json(state.catalog().create_map(revision, user)?))
}

pub async fn update_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(map_id): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
    Json(revision): Json<MapRevision>,
) -> Result<Json<Map>, ApiError> {
    let user = auth.require(Scope::Write)?;
    let expected = expected_version(&RawParams(raw))?;
    validate_overrides(&revision.overrides)?;
    Ok(Json(
        state.catalog().update_map(&map_id, revision, user, expected)?,
    ))
}

pub async fn publish_map(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(map_id): Path<String>,
) -> Result<Json<Map>, ApiError> {
    let user = auth.require(Scope::Publish)?;
    Ok(Json(state.catalog().publish_map(&map_id, user)?))
}

pub async fn list_templates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Template>>, ApiError> {
    auth.require(Scope::Read)?;
    let version = version_selector(&RawParams(raw))?;
    Ok(Json(state.catalog().get_templates(None, version)?))
}

pub async fn get_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(template_id): Path<String>,
) -> Result<Json<Template>, ApiError> {
    auth.require(Scope::Read)?;
    Ok(Json(state.catalog().get_template(&template_id)?))
}

pub async fn create_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(revision): Json<NewTemplate>,
) -> Result<Json<Template>, ApiError> {
    let user = auth.require(Scope::Write)?;
    Ok(Json(state.catalog().create_template(revision, user)?))
}

pub async fn update_template(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(template_id): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
    Json(revision): Json<NewTemplate>,
) -> Result<Json<Template>, ApiError> {
    let user = auth.require(Scope::Write)?;
    let expected = expected_version(&RawParams(raw))?;
    Ok(Json(state.catalog().update_template(
        &template_id,
        revision,
        user,
        expected,
    )?))
}

pub async fn get_userdata(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserData>, ApiError> {
    let user = auth.require(Scope::Read)?;
    state
        .catalog()
        .get_userdata(user)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("user data for {}", user.username)))
}

pub async fn create_userdata(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(revision): Json<UserDataRevision>,
) -> Result<Json<UserData>, ApiError> {
    let user = auth.require(Scope::Write)?;
    Ok(Json(state.catalog().create_userdata(revision, user)?))
}

pub async fn update_userdata(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(revision): Json<UserDataRevision>,
) -> Result<Json<UserData>, ApiError> {
    let user = auth.require(Scope::Write)?;
    Ok(Json(state.catalog().update_userdata(revision, user)?))
}
