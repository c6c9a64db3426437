// SPDX-License-Identifier: Apache-2.0
//! End-to-end checks of the sheet-cache datasource over a seeded store.

#![allow(clippy::unwrap_used)]

use netmap_filter::validate_equality_filters;
use netmap_model::{Dataset, DatasetQuery, FilterParams, Operator, PathLayout, QueryFilter};
use netmap_source::{Context, Datasource, SheetCacheSource, SourceError};
use netmap_store::MemoryStore;
use netmap_topology::NodeTemplate;
use std::path::PathBuf;
use std::sync::Arc;

fn seeded_source() -> SheetCacheSource {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/circuits.json");
    let source = SheetCacheSource::new(Arc::new(MemoryStore::new()), Some(fixture));
    let loaded = source.fetch().unwrap();
    assert_eq!(loaded, 9, "2 sheets + 7 edges");
    source
}

fn circuits_context() -> Context {
    let mut context = Context::new();
    context.insert("sheet_id".into(), "f1".into());
    context
}

fn count(source: &SheetCacheSource, filters: &[QueryFilter]) -> usize {
    source
        .query(filters, None, true, &FilterParams::new(), &circuits_context())
        .unwrap()
        .count
}

#[test]
fn unfiltered_query_returns_every_circuit() {
    let source = seeded_source();
    let result = source
        .query(&[], None, true, &FilterParams::new(), &circuits_context())
        .unwrap();
    assert_eq!(result.count, 7);
    let ids: Vec<&str> = result
        .data
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["C1", "C2", "C3", "C4", "C5", "C6", "C7"]);
}

#[test]
fn filter_counts_match_the_fixture() {
    let source = seeded_source();
    let cases: Vec<(Vec<QueryFilter>, usize)> = vec![
        (
            vec![
                QueryFilter::equal("circuit_state_name", vec!["In-service".into()]),
                QueryFilter::with_operator(
                    "circuit_type_name",
                    Operator::NotEqual,
                    vec!["Dark Fiber".into()],
                ),
            ],
            4,
        ),
        (
            vec![QueryFilter::equal(
                "endpoints_location_name",
                vec!["CHIC-HUB".into()],
            )],
            1,
        ),
        (
            vec![QueryFilter::equal("location_tags", vec!["ESnet5".into()])],
            3,
        ),
        (
            vec![QueryFilter::equal("location_tags", vec!["ESnet6".into()])],
            4,
        ),
        (
            vec![QueryFilter::equal(
                "location_tags",
                vec!["ESnet5".into(), "ESnet6".into()],
            )],
            7,
        ),
        (
            vec![QueryFilter::with_operator(
                "circuit_speed_name",
                Operator::Like,
                vec!["40".into()],
            )],
            1,
        ),
        (
            vec![QueryFilter::with_operator(
                "circuit_speed_name",
                Operator::NotLike,
                vec!["40".into()],
            )],
            3,
        ),
        (
            vec![QueryFilter::with_operator(
                "endpoints_location_name",
                Operator::Like,
                vec!["EQX".into()],
            )],
            2,
        ),
    ];
    for (filters, expected) in cases {
        assert_eq!(
            count(&source, &filters),
            expected,
            "filters: {:?}",
            filters
        );
    }
}

#[test]
fn limits_truncate_data_but_not_count() {
    let source = seeded_source();
    let result = source
        .query(&[], Some(3), true, &FilterParams::new(), &circuits_context())
        .unwrap();
    assert_eq!(result.count, 7);
    assert_eq!(result.data.len(), 3);
}

#[test]
fn substring_filters_skip_validation_and_may_match_nothing() {
    let source = seeded_source();
    let filters = vec![QueryFilter::with_operator(
        "circuit_type_name",
        Operator::Like,
        vec!["zzz-no-such-type".into()],
    )];
    assert_eq!(count(&source, &filters), 0);
}

#[test]
fn distinct_values_cover_scalars_arrays_and_endpoint_columns() {
    let source = seeded_source();
    let context = circuits_context();
    let params = FilterParams::new();

    let types = source
        .distinct_values("circuit_type_name", &[], &params, &context)
        .unwrap();
    assert_eq!(
        types,
        [
            "Backbone",
            "Dark Fiber",
            "Equipment-Equipment",
            "Lane-Panel",
            "Panel-Lane",
        ]
    );

    let tags = source
        .distinct_values("location_tags", &[], &params, &context)
        .unwrap();
    assert!(tags.contains(&"ESnet5".to_string()));
    assert!(tags.contains(&"ESnet6".to_string()));

    let locations = source
        .distinct_values("endpoints_location_name", &[], &params, &context)
        .unwrap();
    assert_eq!(locations.len(), 11);

    let filters = vec![QueryFilter::equal("customer_name", vec!["NERSC".into()])];
    let nersc_types = source
        .distinct_values("circuit_type_name", &filters, &params, &context)
        .unwrap();
    assert_eq!(nersc_types, ["Equipment-Equipment", "Lane-Panel", "Panel-Lane"]);
}

#[test]
fn equality_values_outside_the_distinct_set_are_rejected() {
    let source = seeded_source();
    let context = circuits_context();
    let params = FilterParams::new();
    let filters = vec![QueryFilter::equal(
        "circuit_type_name",
        vec!["Wet String".into()],
    )];
    let error = validate_equality_filters(&filters, |field| {
        source
            .distinct_values(field, &[], &params, &context)
            .map_err(|err| match err {
                SourceError::Filter(inner) => inner,
                other => panic!("unexpected error: {other}"),
            })
    })
    .unwrap_err();
    assert!(error.to_string().starts_with("Value must be one of"));
}

#[test]
fn queries_without_a_sheet_id_are_rejected() {
    let source = seeded_source();
    let error = source
        .query(&[], None, true, &FilterParams::new(), &Context::new())
        .unwrap_err();
    assert!(matches!(error, SourceError::BadRequest(_)));
}

#[test]
fn filterable_fields_include_dynamic_columns_with_operator_variants() {
    let source = seeded_source();
    let fields = source.filterable_fields(&circuits_context()).unwrap();
    for expected in [
        "name",
        "endpoints_name",
        "endpoints_name_not_like",
        "location_tags",
        "location_tags_not_equal",
    ] {
        assert!(fields.contains(&expected.to_string()), "missing {expected}");
    }
}

#[test]
fn metadata_skips_sheets_without_columns() {
    let source = seeded_source();
    let metadata = source.metadata().unwrap();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0]["context"]["sheet_id"], "f1");
    assert_eq!(metadata[0]["display_name"], "\u{1F4CA} Circuits");
}

#[test]
fn topologies_render_from_live_rows_and_snapshots() {
    let source = seeded_source();
    let context = circuits_context();
    let params = FilterParams::new();
    let template = NodeTemplate::new("<g data-width=\"48\">{{name}}</g>").unwrap();

    let mut dataset = Dataset {
        dataset_id: "abc1234".into(),
        name: "circuits".into(),
        version: 1,
        last_updated_by: "admin".into(),
        last_updated_on: chrono::Utc::now(),
        query: DatasetQuery {
            endpoint: "sheets?sheet_id=f1".into(),
            filters: vec![QueryFilter::equal("location_tags", vec!["ESnet5".into()])],
            node_deduplication_field: Some("location_name".into()),
            node_group_criteria: None,
            node_group_layout: None,
        },
        results: None,
    };

    let live = source
        .render_topology(&dataset, PathLayout::cardinal(), false, &template, &params, &context)
        .unwrap();
    assert_eq!(live.edges.len(), 3);
    assert_eq!(live.name, "circuits");

    let error = source
        .render_topology(&dataset, PathLayout::cardinal(), true, &template, &params, &context)
        .unwrap_err();
    assert!(matches!(error, SourceError::NoSnapshot));

    dataset.results = Some(
        source
            .query(&dataset.query.filters, None, true, &params, &context)
            .unwrap()
            .data,
    );
    let snapshot = source
        .render_topology(&dataset, PathLayout::cardinal(), true, &template, &params, &context)
        .unwrap();
    assert_eq!(snapshot.edges.len(), 3);
}
