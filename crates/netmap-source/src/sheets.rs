// SPDX-License-Identifier: Apache-2.0
//! Sheet-cache datasource.
//!
//! Fronts edge documents an external spreadsheet job normalizes into
//! the document store: one envelope row `{sheet_id, edge}` per circuit
//! plus one metadata row per sheet listing its discovered columns and
//! their shapes. The static edge schema covers the fields every sheet
//! shares; sheet-specific columns extend a per-sheet clone of the
//! classification at query time.
//!
//! `fetch` loads the normalized documents from a configured seed file,
//! standing in for the ingestion job itself.

use crate::{Context, Datasource, SourceError};
use netmap_filter::{compile, Predicate};
use netmap_model::{
    Dataset, FilterParams, PathLayout, QueryFilter, QueryResult, Topology,
};
use netmap_schema::{ClassifiedSchema, RecordSchema};
use netmap_store::{DocumentStore, QueryOptions, StoreError};
use netmap_topology::{build_graph, NodeTemplate};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

const EDGES: &str = "sheet_edges";
const SHEETS: &str = "sheet_metadata";

#[allow(clippy::expect_used)]
static EDGE_SCHEMA: Lazy<ClassifiedSchema> = Lazy::new(|| {
    RecordSchema::new()
        .scalar("id")
        .scalar("name")
        .scalar("description")
        .scalar("source")
        .scalar("destination")
        .object_array("endpoints", "endpoint")
        .def("endpoint", ["name", "latitude", "longitude", "description"])
        .classify()
        .expect("static edge schema")
});

#[derive(Debug, Deserialize)]
struct SheetInfo {
    sheet_id: String,
    sheet_name: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    sheets: Vec<Value>,
    #[serde(default)]
    edges: Vec<Value>,
}

/// Datasource over cached sheet edge documents.
pub struct SheetCacheSource {
    store: Arc<dyn DocumentStore>,
    seed_path: Option<PathBuf>,
}

impl SheetCacheSource {
    /// Source over `store`, refreshed from `seed_path` on fetch.
    pub fn new(store: Arc<dyn DocumentStore>, seed_path: Option<PathBuf>) -> Self {
        Self { store, seed_path }
    }

    fn sheet_id<'a>(context: &'a Context) -> Result<&'a str, SourceError> {
        context.get("sheet_id").map(String::as_str).ok_or_else(|| {
            SourceError::BadRequest(
                "queries to the sheet cache require a sheet_id".to_string(),
            )
        })
    }

    fn list_sheets(&self) -> Result<Vec<SheetInfo>, SourceError> {
        let docs = self
            .store
            .query(SHEETS, &Predicate::True, &QueryOptions::default())?;
        let sheets = docs
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect::<Result<_, _>>()?;
        Ok(sheets)
    }

    fn sheet_info(&self, sheet_id: &str) -> Result<SheetInfo, SourceError> {
        let docs = self.store.query(
            SHEETS,
            &Predicate::field_eq("sheet_id", sheet_id),
            &QueryOptions::default(),
        )?;
        let doc = docs
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("sheet {sheet_id}")))?;
        Ok(serde_json::from_value(doc).map_err(StoreError::from)?)
    }

    /// Per-sheet classification: the static edge schema extended with
    /// the sheet's own array columns. Scalar columns need no entry and
    /// `endpoints_*` compounds resolve through the prefix marker.
    fn schema(&self, sheet_id: &str) -> Result<ClassifiedSchema, SourceError> {
        let info = self.sheet_info(sheet_id)?;
        let mut schema = EDGE_SCHEMA.clone();
        for (column, shape) in info.columns.iter().zip(info.types.iter()) {
            if shape == "array" {
                schema.register_string_array(column);
            }
        }
        Ok(schema)
    }

    /// Record rows for one sheet matching the given record predicate,
    /// ordered by record id.
    fn records(&self, sheet_id: &str, predicate: Predicate) -> Result<Vec<Value>, SourceError> {
        let envelope = predicate
            .prefixed("edge")
            .and(Predicate::field_eq("sheet_id", sheet_id));
        let rows = self
            .store
            .query(EDGES, &envelope, &QueryOptions::default())?;
        let mut records: Vec<Value> = rows
            .into_iter()
            .filter_map(|mut row| row.get_mut("edge").map(Value::take))
            .collect();
        records.sort_by_key(|record| {
            record
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        });
        Ok(records)
    }
}

impl Datasource for SheetCacheSource {
    fn query(
        &self,
        filters: &[QueryFilter],
        limit: Option<usize>,
        apply_templated: bool,
        params: &FilterParams,
        context: &Context,
    ) -> Result<QueryResult, SourceError> {
        let sheet_id = Self::sheet_id(context)?;
        let schema = self.schema(sheet_id)?;
        let predicate = compile(filters, &schema, params, apply_templated)?;
        let mut records = self.records(sheet_id, predicate)?;
        let count = records.len();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(QueryResult {
            count,
            data: records,
        })
    }

    fn distinct_values(
        &self,
        field: &str,
        filters: &[QueryFilter],
        params: &FilterParams,
        context: &Context,
    ) -> Result<Vec<String>, SourceError> {
        let sheet_id = Self::sheet_id(context)?;
        let schema = self.schema(sheet_id)?;
        let records = self.records(sheet_id, Predicate::True)?;
        Ok(netmap_filter::distinct_values(
            &records, field, &schema, filters, params,
        )?)
    }

    fn filterable_fields(&self, context: &Context) -> Result<Vec<String>, SourceError> {
        let sheet_id = Self::sheet_id(context)?;
        Ok(self.schema(sheet_id)?.filterable_fields())
    }

    fn render_topology(
        &self,
        dataset: &Dataset,
        path_layout: PathLayout,
        use_snapshot: bool,
        template: &NodeTemplate,
        params: &FilterParams,
        context: &Context,
    ) -> Result<Topology, SourceError> {
        let rows = if use_snapshot {
            dataset.results.clone().ok_or(SourceError::NoSnapshot)?
        } else {
            self.query(&dataset.query.filters, None, true, params, context)?
                .data
        };
        let criteria = dataset
            .query
            .node_group_criteria
            .clone()
            .unwrap_or_default();
        let (nodes, edges) = build_graph(&rows, &criteria, template)?;
        Ok(Topology {
            nodes,
            edges,
            layer: "tail".to_string(),
            name: dataset.name.clone(),
            path_layout,
        })
    }

    fn metadata(&self) -> Result<Vec<Value>, SourceError> {
        let mut output = Vec::new();
        for sheet in self.list_sheets()? {
            // Sheets without discovered columns don't match the edge
            // format and aren't queryable.
            if sheet.columns.is_empty() {
                continue;
            }
            let sheet_id = &sheet.sheet_id;
            output.push(json!({
                "nickname": "sheet_edge",
                "nickname_plural": "sheet_edges",
                "display_name": format!("\u{1F4CA} {}", sheet.sheet_name),
                "variable": "sheet_id",
                "context": {"sheet_id": sheet_id},
                "query_endpoint": format!("/source/sheets/records?sheet_id={sheet_id}"),
                "distinct_values_endpoint":
                    format!("/source/sheets/types/{{field}}?sheet_id={sheet_id}"),
                "filterable_columns": self.schema(sheet_id)?.filterable_fields(),
            }));
        }
        Ok(output)
    }

    fn fetch(&self) -> Result<usize, SourceError> {
        let Some(path) = &self.seed_path else {
            tracing::debug!("sheet cache has no seed file configured, nothing to fetch");
            return Ok(0);
        };
        let raw = std::fs::read(path).map_err(StoreError::from)?;
        let seed: SeedFile = serde_json::from_slice(&raw).map_err(StoreError::from)?;

        let mut loaded = 0;
        for sheet in &seed.sheets {
            let Some(sheet_id) = sheet.get("sheet_id").and_then(Value::as_str) else {
                tracing::warn!(?sheet, "seed sheet without sheet_id, skipped");
                continue;
            };
            self.store.create(SHEETS, sheet_id, sheet.clone())?;
            loaded += 1;
        }
        for (index, envelope) in seed.edges.iter().enumerate() {
            let sheet_id = envelope
                .get("sheet_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let edge_id = envelope
                .get("edge")
                .and_then(|edge| edge.get("id"))
                .and_then(Value::as_str)
                .map_or_else(|| index.to_string(), str::to_string);
            self.store
                .create(EDGES, &format!("{sheet_id}:{edge_id}"), envelope.clone())?;
            loaded += 1;
        }
        tracing::info!(count = loaded, path = %path.display(), "sheet cache refreshed");
        Ok(loaded)
    }
}
