// SPDX-License-Identifier: Apache-2.0
//! Bearer-token authentication.
//!
//! Tokens are opaque strings from the daemon settings, each mapped to a
//! principal with a scope list. Handlers extract [`AuthUser`] and then
//! assert the scope the operation needs.

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use netmap_model::{Scope, User};

/// The authenticated principal for one request.
pub struct AuthUser(pub User);

impl AuthUser {
    /// Fail with 403 unless the principal holds `scope`.
    pub fn require(&self, scope: Scope) -> Result<&User, ApiError> {
        if self.0.has_scope(scope) {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden(format!(
                "Insufficient permissions for this action. Required scope: {scope:?}, found scopes: {:?}",
                self.0.scopes
            )))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        match state.token_user(token) {
            Some(user) => Ok(Self(user.clone())),
            None => Err(ApiError::unauthorized("Invalid token")),
        }
    }
}
