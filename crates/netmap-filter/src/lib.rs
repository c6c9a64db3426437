// SPDX-License-Identifier: Apache-2.0
//! Filter compilation and evaluation.
//!
//! [`compile`] turns a list of query filters, resolved against a
//! classified schema, into a [`Predicate`] tree. [`eval`] evaluates
//! that tree against JSON documents, and [`distinct`] resolves the
//! legal value set of a field over filtered rows. Together these form
//! the query half of every datasource.

pub mod compile;
pub mod distinct;
pub mod eval;
pub mod predicate;

pub use compile::compile;
pub use distinct::{distinct_values, validate_equality_filters};
pub use eval::eval;
pub use predicate::{Cmp, Predicate};

use thiserror::Error;

/// Filter-processing failure.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A templated filter had no value in the request parameters.
    #[error("Malformed request. Expected '?{0}=' in query parameters.")]
    MissingTemplatedParam(String),
    /// An equality filter value is outside the field's legal set.
    #[error("Value must be one of {}", format_allowed(allowed))]
    Validation {
        /// The offending filter field.
        field: String,
        /// The legal distinct-value set for that field.
        allowed: Vec<String>,
    },
}

fn format_allowed(allowed: &[String]) -> String {
    let quoted: Vec<String> = allowed.iter().map(|v| format!("'{v}'")).collect();
    format!("[{}]", quoted.join(", "))
}
