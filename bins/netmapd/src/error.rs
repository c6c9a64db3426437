// SPDX-License-Identifier: Apache-2.0
//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use netmap_filter::FilterError;
use netmap_source::SourceError;
use netmap_store::StoreError;
use netmap_topology::TopologyError;
use serde_json::json;

/// An error ready to leave the HTTP boundary.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            detail: detail.into(),
        }
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "request failed");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::MissingTemplatedParam(_) | FilterError::Validation { .. } => {
                Self::bad_request(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::not_found(err.to_string()),
            StoreError::Conflict { .. } => Self {
                status: StatusCode::CONFLICT,
                detail: err.to_string(),
            },
            StoreError::Decode(_) | StoreError::Io(_) | StoreError::Poisoned => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnknownSource(_) | SourceError::NoSnapshot => {
                Self::not_found(err.to_string())
            }
            SourceError::BadRequest(_) => Self::bad_request(err.to_string()),
            SourceError::Filter(inner) => inner.into(),
            SourceError::Store(inner) => inner.into(),
            SourceError::Topology(inner) => inner.into(),
        }
    }
}

impl From<handlebars::RenderError> for ApiError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::internal(format!("svg render failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::from(FilterError::Validation {
            field: "circuit_type_name".into(),
            allowed: vec!["Backbone".into()],
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_source_maps_to_not_found() {
        let err = ApiError::from(SourceError::UnknownSource("nope".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflicts_surface_as_409() {
        let err = ApiError::from(StoreError::Conflict {
            expected: 2,
            actual: 3,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
