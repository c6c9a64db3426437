// SPDX-License-Identifier: Apache-2.0
//! Resolved authentication principal.
//!
//! Authentication itself is an external collaborator; the core only
//! receives the resolved user to stamp `lastUpdatedBy` and to check
//! scopes at the HTTP boundary.

use serde::{Deserialize, Serialize};

/// Access scopes granted to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Read maps, datasets, templates and datasource records.
    Read,
    /// Create and update documents, run live queries.
    Write,
    /// Publish maps publicly.
    Publish,
    /// Administrative operations.
    Admin,
}

/// A resolved principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Stable username used for `lastUpdatedBy` stamping.
    pub username: String,
    /// Granted scopes.
    pub scopes: Vec<Scope>,
}

impl User {
    /// True when the principal holds `scope`.
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}
