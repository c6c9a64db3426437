// SPDX-License-Identifier: Apache-2.0
//! Group-node meta intersection.

use serde_json::{Map, Value};

/// Fold one more member record into a group node's meta.
///
/// A group's meta converges to the fields common to all of its members:
/// keys whose values differ, or that the incoming record lacks, are
/// dropped.
pub fn merge_meta(existing: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    existing
        .iter()
        .filter(|(key, value)| incoming.get(*key) == Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn keeps_only_agreeing_fields() {
        let existing = map(json!({"region": "R1", "name": "X", "rack": "a4"}));
        let incoming = map(json!({"region": "R1", "name": "Y"}));
        let merged = merge_meta(&existing, &incoming);
        assert_eq!(merged, map(json!({"region": "R1"})));
    }

    #[test]
    fn merge_is_idempotent_on_equal_records() {
        let record = map(json!({"region": "R1", "site": "CHIC"}));
        assert_eq!(merge_meta(&record, &record), record);
    }
}
