// SPDX-License-Identifier: Apache-2.0
//! Record schema description and filter-field classification.
//!
//! A datasource declares the shape of its records once as a
//! [`RecordSchema`]. Classification walks the top-level fields a single
//! time and produces a [`ClassifiedSchema`]: the table from synthetic
//! filter-field name (base name plus operator-suffix variants) to the
//! field's parent and [`FieldKind`]. Everything downstream, the filter
//! compiler in particular, dispatches on that table instead of
//! re-inspecting record shapes.
//!
//! Scalar fields deliberately get no table entry. Absence from the
//! table is the scalar case, so columns discovered only at runtime
//! (spreadsheet columns, say) still filter correctly without being
//! declared here.

use netmap_model::Operator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Classification failure.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A field references a sub-schema definition that was never added.
    #[error("field `{field}` references unknown definition `{def}`")]
    UnknownDef {
        /// The referencing field.
        field: String,
        /// The missing definition name.
        def: String,
    },
}

/// Declared shape of one top-level record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    /// A primitive value (string, number, bool, null).
    Scalar,
    /// An array of strings.
    StringArray,
    /// A single nested record, by definition name.
    Object(String),
    /// An array of nested records, by definition name.
    ObjectArray(String),
}

/// Declarative description of a record type: top-level fields plus one
/// level of named sub-schema definitions.
#[derive(Debug, Clone, Default)]
pub struct RecordSchema {
    fields: BTreeMap<String, FieldShape>,
    defs: BTreeMap<String, Vec<String>>,
}

impl RecordSchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a scalar field.
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldShape::Scalar);
        self
    }

    /// Declare an array-of-string field.
    pub fn string_array(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldShape::StringArray);
        self
    }

    /// Declare a single nested record field referencing `def`.
    pub fn object(mut self, name: impl Into<String>, def: impl Into<String>) -> Self {
        self.fields
            .insert(name.into(), FieldShape::Object(def.into()));
        self
    }

    /// Declare an array-of-record field referencing `def`.
    pub fn object_array(mut self, name: impl Into<String>, def: impl Into<String>) -> Self {
        self.fields
            .insert(name.into(), FieldShape::ObjectArray(def.into()));
        self
    }

    /// Add a named sub-schema definition listing its property names.
    pub fn def<I, S>(mut self, name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defs
            .insert(name.into(), properties.into_iter().map(Into::into).collect());
        self
    }

    /// Classify every field into the filter-field table.
    ///
    /// One pass over the declared fields:
    /// - string arrays register the base name plus each non-default
    ///   operator variant;
    /// - object arrays register `<field>_<property>` (plus variants) for
    ///   every property of the referenced definition, and mark the bare
    ///   field name as a compound-name prefix;
    /// - single nested objects register `<field>_<property>` (plus
    ///   variants) without the prefix marker;
    /// - scalars register nothing and fall through at lookup time.
    pub fn classify(&self) -> Result<ClassifiedSchema, SchemaError> {
        let mut classified = ClassifiedSchema::default();
        for (field, shape) in &self.fields {
            match shape {
                FieldShape::Scalar => {
                    classified.scalars.insert(field.clone());
                }
                FieldShape::StringArray => {
                    classified.register(field, field, None, FieldKind::StringArray);
                }
                FieldShape::Object(def) => {
                    for property in self.resolve_def(field, def)? {
                        classified.register_nested(field, property, FieldKind::NestedObject);
                    }
                }
                FieldShape::ObjectArray(def) => {
                    for property in self.resolve_def(field, def)? {
                        classified.register_nested(field, property, FieldKind::NestedObjectArray);
                    }
                    classified.prefixes.insert(field.clone());
                }
            }
        }
        Ok(classified)
    }

    fn resolve_def(&self, field: &str, def: &str) -> Result<&[String], SchemaError> {
        self.defs
            .get(def)
            .map(Vec::as_slice)
            .ok_or_else(|| SchemaError::UnknownDef {
                field: field.to_string(),
                def: def.to_string(),
            })
    }
}

/// Shape class of a filter field, as the compiler dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain field on the record itself.
    Scalar,
    /// Array of strings on the record.
    StringArray,
    /// Property of a single nested record.
    NestedObject,
    /// Property of elements of a nested record array.
    NestedObjectArray,
}

/// A filter field resolved to its storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldClass {
    /// Shape class.
    pub kind: FieldKind,
    /// The record field holding the value (the array or object field
    /// for nested kinds, the field itself otherwise).
    pub parent: String,
    /// Property within the nested record, for the nested kinds.
    pub child: Option<String>,
}

impl FieldClass {
    fn scalar(field: &str) -> Self {
        Self {
            kind: FieldKind::Scalar,
            parent: field.to_string(),
            child: None,
        }
    }
}

/// The classification table: synthetic filter-field name to
/// [`FieldClass`], plus the compound-name prefix set and the scalar
/// field list (kept only for field enumeration).
///
/// Built once per record type and cached by the owning datasource;
/// immutable after construction except for [`register_dynamic_column`],
/// which sources with runtime-discovered columns call on a clone.
///
/// [`register_dynamic_column`]: ClassifiedSchema::register_dynamic_column
#[derive(Debug, Clone, Default)]
pub struct ClassifiedSchema {
    entries: BTreeMap<String, FieldClass>,
    prefixes: BTreeSet<String>,
    scalars: BTreeSet<String>,
}

impl ClassifiedSchema {
    fn register(&mut self, name: &str, parent: &str, child: Option<&str>, kind: FieldKind) {
        let class = FieldClass {
            kind,
            parent: parent.to_string(),
            child: child.map(str::to_string),
        };
        self.entries.insert(name.to_string(), class.clone());
        for operator in Operator::modifiers() {
            if let Some(suffix) = operator.suffix() {
                self.entries.insert(format!("{name}_{suffix}"), class.clone());
            }
        }
    }

    fn register_nested(&mut self, parent: &str, property: &str, kind: FieldKind) {
        let name = format!("{parent}_{property}");
        self.register(&name, parent, Some(property), kind);
    }

    /// Register a runtime-discovered column as a property of the
    /// object-array field `parent`.
    pub fn register_dynamic_column(&mut self, parent: &str, property: &str) {
        self.register_nested(parent, property, FieldKind::NestedObjectArray);
    }

    /// Register a runtime-discovered array-of-string column.
    pub fn register_string_array(&mut self, field: &str) {
        self.register(field, field, None, FieldKind::StringArray);
    }

    /// Resolve a filter field (as carried on a `QueryFilter`, suffix
    /// already stripped) under the given operator.
    ///
    /// Lookup order: exact table entry for `field` plus the operator's
    /// suffix, then the bare field, then the compound-name prefix set,
    /// then the scalar fallthrough.
    pub fn resolve(&self, field: &str, operator: Operator) -> FieldClass {
        if let Some(suffix) = operator.suffix() {
            if let Some(class) = self.entries.get(&format!("{field}_{suffix}")) {
                return class.clone();
            }
        }
        if let Some(class) = self.entries.get(field) {
            return class.clone();
        }
        for prefix in &self.prefixes {
            if let Some(child) = field.strip_prefix(prefix.as_str()).and_then(|rest| rest.strip_prefix('_')) {
                return FieldClass {
                    kind: FieldKind::NestedObjectArray,
                    parent: prefix.clone(),
                    child: Some(child.to_string()),
                };
            }
        }
        FieldClass::scalar(field)
    }

    /// Every synthetic filter-field name this schema accepts, sorted:
    /// the classified entries plus scalar bases, each with its operator
    /// variants.
    pub fn filterable_fields(&self) -> Vec<String> {
        let mut fields: BTreeSet<String> = self.entries.keys().cloned().collect();
        for scalar in &self.scalars {
            fields.insert(scalar.clone());
            for operator in Operator::modifiers() {
                if let Some(suffix) = operator.suffix() {
                    fields.insert(format!("{scalar}_{suffix}"));
                }
            }
        }
        fields.into_iter().collect()
    }
}

/// Split an incoming filter-field name into its base name and operator.
///
/// Longest suffix wins, so `_not_like` is never misread as `_like`.
pub fn decode_field(name: &str) -> (&str, Operator) {
    for operator in Operator::modifiers() {
        if let Some(suffix) = operator.suffix() {
            if let Some(base) = name
                .strip_suffix(suffix)
                .and_then(|rest| rest.strip_suffix('_'))
            {
                return (base, operator);
            }
        }
    }
    (name, Operator::Equal)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn circuit_schema() -> RecordSchema {
        RecordSchema::new()
            .scalar("circuit_id")
            .scalar("circuit_type_name")
            .string_array("location_tags")
            .object("orchestrator", "orchestrator")
            .object_array("endpoints", "endpoint")
            .def("endpoint", ["name", "location_name", "lat", "lon"])
            .def("orchestrator", ["id", "status"])
    }

    #[test]
    fn string_array_registers_operator_variants() {
        let classified = circuit_schema().classify().unwrap();
        for field in [
            "location_tags",
            "location_tags_like",
            "location_tags_not_like",
            "location_tags_not_equal",
        ] {
            let class = classified.resolve(field, Operator::Equal);
            assert_eq!(class.kind, FieldKind::StringArray, "{field}");
            assert_eq!(class.parent, "location_tags");
        }
    }

    #[test]
    fn object_array_registers_compound_names_and_prefix() {
        let classified = circuit_schema().classify().unwrap();
        let class = classified.resolve("endpoints_location_name", Operator::NotEqual);
        assert_eq!(class.kind, FieldKind::NestedObjectArray);
        assert_eq!(class.parent, "endpoints");
        assert_eq!(class.child.as_deref(), Some("location_name"));

        // Compound names never pre-registered still resolve through the
        // prefix marker.
        let class = classified.resolve("endpoints_vendor_id", Operator::Equal);
        assert_eq!(class.kind, FieldKind::NestedObjectArray);
        assert_eq!(class.parent, "endpoints");
        assert_eq!(class.child.as_deref(), Some("vendor_id"));
    }

    #[test]
    fn nested_object_resolves_without_existential() {
        let classified = circuit_schema().classify().unwrap();
        let class = classified.resolve("orchestrator_status", Operator::Like);
        assert_eq!(class.kind, FieldKind::NestedObject);
        assert_eq!(class.parent, "orchestrator");
        assert_eq!(class.child.as_deref(), Some("status"));
    }

    #[test]
    fn scalars_fall_through() {
        let classified = circuit_schema().classify().unwrap();
        let class = classified.resolve("circuit_type_name", Operator::Equal);
        assert_eq!(class.kind, FieldKind::Scalar);
        assert_eq!(class.parent, "circuit_type_name");
        assert_eq!(class.child, None);

        // Entirely undeclared fields behave as scalars too.
        let class = classified.resolve("invented", Operator::Equal);
        assert_eq!(class.kind, FieldKind::Scalar);
    }

    #[test]
    fn dynamic_columns_extend_a_clone() {
        let base = circuit_schema().classify().unwrap();
        let mut extended = base.clone();
        extended.register_dynamic_column("edge", "Capacity");
        let class = extended.resolve("edge_Capacity", Operator::Equal);
        assert_eq!(class.kind, FieldKind::NestedObjectArray);
        assert_eq!(class.parent, "edge");
        assert_eq!(
            base.resolve("edge_Capacity", Operator::Equal).kind,
            FieldKind::Scalar
        );
    }

    #[test]
    fn decode_field_prefers_longest_suffix() {
        assert_eq!(
            decode_field("circuit_speed_name_not_like"),
            ("circuit_speed_name", Operator::NotLike)
        );
        assert_eq!(
            decode_field("circuit_speed_name_like"),
            ("circuit_speed_name", Operator::Like)
        );
        assert_eq!(
            decode_field("circuit_type_name_not_equal"),
            ("circuit_type_name", Operator::NotEqual)
        );
        assert_eq!(decode_field("name"), ("name", Operator::Equal));
    }

    #[test]
    fn filterable_fields_cover_scalars_and_nested() {
        let fields = circuit_schema().classify().unwrap().filterable_fields();
        for expected in [
            "circuit_id",
            "circuit_id_not_equal",
            "location_tags_like",
            "endpoints_name",
            "endpoints_lat_not_like",
            "orchestrator_id",
        ] {
            assert!(fields.contains(&expected.to_string()), "{expected}");
        }
    }
}
