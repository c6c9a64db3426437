// SPDX-License-Identifier: Apache-2.0
//! Datasource metadata, record queries and distinct-value listings.
//!
//! Filter criteria arrive as plain query parameters with operator
//! suffixes. Parameters matching a context key the source advertises in
//! its metadata (`sheet_id` for the sheet cache) route to the source as
//! context instead of becoming filters.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::params::RawParams;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header::HeaderName;
use axum::response::IntoResponse;
use axum::Json;
use netmap_filter::validate_equality_filters;
use netmap_model::{FilterParams, QueryFilter, Scope};
use netmap_source::{Context, Datasource, SourceError};
use serde_json::{json, Map as JsonMap, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 10;

/// Flattened metadata for every registered source, keyed by the
/// endpoint string (`name` or `name?context`) a dataset would store.
pub async fn list_sources(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<JsonMap<String, Value>>, ApiError> {
    auth.require(Scope::Read)?;
    let mut metadata = JsonMap::new();
    for (name, source) in state.registry().iter() {
        for entry in source.metadata()? {
            metadata.insert(endpoint_key(name, &entry), entry);
        }
    }
    Ok(Json(metadata))
}

fn endpoint_key(name: &str, entry: &Value) -> String {
    let Some(context) = entry.get("context").and_then(Value::as_object) else {
        return name.to_string();
    };
    let pairs: Vec<String> = context
        .iter()
        .filter_map(|(key, value)| value.as_str().map(|v| format!("{key}={v}")))
        .collect();
    if pairs.is_empty() {
        name.to_string()
    } else {
        format!("{name}?{}", pairs.join("&"))
    }
}

/// Context keys this source's sub-sources accept, from its metadata.
fn context_keys(source: &Arc<dyn Datasource>) -> Result<Vec<String>, ApiError> {
    let mut keys = BTreeSet::new();
    for entry in source.metadata()? {
        if let Some(context) = entry.get("context").and_then(Value::as_object) {
            keys.extend(context.keys().cloned());
        }
    }
    Ok(keys.into_iter().collect())
}

/// Reject equality filters whose values fall outside the field's
/// distinct-value set.
fn validate_filters(
    source: &Arc<dyn Datasource>,
    filters: &[QueryFilter],
    context: &Context,
) -> Result<(), ApiError> {
    // A failed distinct lookup must surface as itself, not as a
    // validation failure against an empty set.
    let mut lookup_failure: Option<SourceError> = None;
    let outcome = validate_equality_filters(filters, |field| {
        match source.distinct_values(field, &[], &FilterParams::new(), context) {
            Ok(values) => Ok(values),
            Err(err) => {
                lookup_failure.get_or_insert(err);
                Ok(Vec::new())
            }
        }
    });
    if let Some(err) = lookup_failure {
        return Err(err.into());
    }
    Ok(outcome?)
}

pub async fn records(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Scope::Read)?;
    let source = state.registry().get(&name)?;
    let (context, rest) = RawParams(raw).split_context(&context_keys(&source)?);

    let limit = match rest.first("limit") {
        None => DEFAULT_LIMIT,
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("invalid limit `{raw}`")))?,
    };
    let filters = rest.decode_filters(&["limit"]);
    validate_filters(&source, &filters, &context)?;

    let result = source.query(&filters, Some(limit), true, &rest.filter_params(), &context)?;
    let headers = [
        (
            HeaderName::from_static("x-result-count"),
            result.count.to_string(),
        ),
        (
            HeaderName::from_static("access-control-expose-headers"),
            "X-Result-Count".to_string(),
        ),
    ];
    Ok((headers, Json(result.data)))
}

pub async fn distinct(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((name, field)): Path<(String, String)>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<String>>, ApiError> {
    auth.require(Scope::Read)?;
    let source = state.registry().get(&name)?;
    let (context, rest) = RawParams(raw).split_context(&context_keys(&source)?);
    let filters = rest.decode_filters(&["limit"]);
    Ok(Json(source.distinct_values(
        &field,
        &filters,
        &rest.filter_params(),
        &context,
    )?))
}

fn display_label(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filterable columns with UI labels, for filter builders.
pub async fn fields(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
    Query(raw): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    auth.require(Scope::Read)?;
    let source = state.registry().get(&name)?;
    let (context, _) = RawParams(raw).split_context(&context_keys(&source)?);
    let columns = source.filterable_fields(&context)?;
    Ok(Json(
        columns
            .into_iter()
            .map(|field| {
                let label = display_label(&field);
                json!({
                    "label": label,
                    "field": field,
                    "placeholder": format!("Filter {label}s..."),
                })
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn labels_title_case_underscored_fields() {
        assert_eq!(display_label("circuit_type_name"), "Circuit Type Name");
        assert_eq!(display_label("name"), "Name");
    }

    #[test]
    fn endpoint_keys_embed_context() {
        let entry = json!({"context": {"sheet_id": "f1"}});
        assert_eq!(endpoint_key("sheets", &entry), "sheets?sheet_id=f1");
        assert_eq!(endpoint_key("sheets", &json!({})), "sheets");
    }
}
