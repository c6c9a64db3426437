// SPDX-License-Identifier: Apache-2.0
//! Typed, versioned document operations over a [`DocumentStore`].
//!
//! Every mutation appends a new row under a fresh storage id rather
//! than rewriting an existing one; "latest" listings collapse on the
//! logical id, keeping the highest version. Updates carry an optional
//! optimistic check against the version the caller last saw.

use crate::{DocumentStore, QueryOptions, SortKey, StoreError};
use chrono::Utc;
use netmap_filter::Predicate;
use netmap_model::{
    Dataset, DatasetRevision, Map, MapRevision, NewTemplate, Template, User, UserData,
    UserDataRevision,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

const DATASETS: &str = "dataset";
const MAPS: &str = "map";
const TEMPLATES: &str = "template";
const USERDATA: &str = "userdata";

/// Which versions of a logical document to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// Highest version per logical id (the default).
    #[default]
    Latest,
    /// Every stored version.
    All,
    /// One specific version.
    Exact(u64),
}

impl FromStr for VersionSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(VersionSelector::Latest),
            "all" => Ok(VersionSelector::All),
            other => other
                .parse()
                .map(VersionSelector::Exact)
                .map_err(|_| format!("invalid version selector `{other}`")),
        }
    }
}

/// Generate a 7-character alphanumeric document id.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>, StoreError> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

fn encode<T: Serialize>(doc: &T) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(StoreError::from)
}

/// The typed catalog.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
}

impl Catalog {
    /// Catalog over the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn versioned_query(
        &self,
        collection: &str,
        logical_key: &str,
        mut predicate: Predicate,
        version: VersionSelector,
    ) -> Result<Vec<Value>, StoreError> {
        let mut options = QueryOptions {
            sort: vec![SortKey::desc("version")],
            ..QueryOptions::default()
        };
        match version {
            VersionSelector::Latest => options.collapse_key = Some(logical_key.to_string()),
            VersionSelector::All => {}
            VersionSelector::Exact(v) => {
                predicate = predicate.and(Predicate::field_eq("version", v.to_string()));
            }
        }
        self.store.query(collection, &predicate, &options)
    }

    fn check_expected(expected: Option<u64>, actual: u64) -> Result<(), StoreError> {
        if let Some(expected) = expected {
            if expected != actual {
                return Err(StoreError::Conflict { expected, actual });
            }
        }
        Ok(())
    }

    // Datasets

    /// List datasets, optionally narrowed to one logical id.
    pub fn get_datasets(
        &self,
        dataset_id: Option<&str>,
        version: VersionSelector,
    ) -> Result<Vec<Dataset>, StoreError> {
        let predicate = match dataset_id {
            Some(id) => Predicate::field_eq("datasetId", id),
            None => Predicate::True,
        };
        decode_all(self.versioned_query(DATASETS, "datasetId", predicate, version)?)
    }

    /// Latest version of one dataset.
    pub fn get_dataset(&self, dataset_id: &str) -> Result<Dataset, StoreError> {
        self.get_datasets(Some(dataset_id), VersionSelector::Latest)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("dataset {dataset_id}")))
    }

    /// Create a dataset at version 1.
    pub fn create_dataset(
        &self,
        revision: DatasetRevision,
        user: &User,
    ) -> Result<Dataset, StoreError> {
        let dataset = Dataset {
            dataset_id: generate_id(),
            name: revision.name,
            version: 1,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            query: revision.query,
            results: None,
        };
        self.store
            .create(DATASETS, &dataset.dataset_id, encode(&dataset)?)?;
        Ok(dataset)
    }

    /// Append a new dataset version carrying a fresh result snapshot.
    pub fn update_dataset(
        &self,
        dataset_id: &str,
        revision: DatasetRevision,
        results: Option<Vec<Value>>,
        user: &User,
        expected_version: Option<u64>,
    ) -> Result<Dataset, StoreError> {
        let latest = self.get_dataset(dataset_id)?;
        Self::check_expected(expected_version, latest.version)?;
        let dataset = Dataset {
            dataset_id: dataset_id.to_string(),
            name: revision.name,
            version: latest.version + 1,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            query: revision.query,
            results,
        };
        self.store.create(DATASETS, &generate_id(), encode(&dataset)?)?;
        Ok(dataset)
    }

    // Maps

    /// List maps, optionally narrowed to one logical id or to public
    /// maps only.
    pub fn get_maps(
        &self,
        map_id: Option<&str>,
        version: VersionSelector,
        public_only: bool,
    ) -> Result<Vec<Map>, StoreError> {
        let mut predicate = match map_id {
            Some(id) => Predicate::field_eq("mapId", id),
            None => Predicate::True,
        };
        if public_only {
            predicate = predicate.and(Predicate::field_eq("public", "true"));
        }
        decode_all(self.versioned_query(MAPS, "mapId", predicate, version)?)
    }

    /// Latest version of one map.
    pub fn get_map(&self, map_id: &str, public_only: bool) -> Result<Map, StoreError> {
        self.get_maps(Some(map_id), VersionSelector::Latest, public_only)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("map {map_id}")))
    }

    /// Create a map at version 1, private.
    pub fn create_map(&self, revision: MapRevision, user: &User) -> Result<Map, StoreError> {
        let map = Map {
            map_id: generate_id(),
            name: revision.name,
            version: 1,
            overrides: revision.overrides,
            configuration: revision.configuration,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            public: Some(false),
        };
        self.store.create(MAPS, &map.map_id, encode(&map)?)?;
        Ok(map)
    }

    /// Append a new map version, preserving its published state.
    pub fn update_map(
        &self,
        map_id: &str,
        revision: MapRevision,
        user: &User,
        expected_version: Option<u64>,
    ) -> Result<Map, StoreError> {
        let latest = self.get_map(map_id, false)?;
        Self::check_expected(expected_version, latest.version)?;
        let map = Map {
            map_id: map_id.to_string(),
            name: revision.name,
            version: latest.version + 1,
            overrides: revision.overrides,
            configuration: revision.configuration,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            public: latest.public.or(Some(false)),
        };
        self.store.create(MAPS, &generate_id(), encode(&map)?)?;
        Ok(map)
    }

    /// Publish a map: copy its latest version with `public = true` and
    /// a bumped version.
    pub fn publish_map(&self, map_id: &str, user: &User) -> Result<Map, StoreError> {
        let latest = self.get_map(map_id, false)?;
        let map = Map {
            version: latest.version + 1,
            public: Some(true),
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            ..latest
        };
        self.store.create(MAPS, &generate_id(), encode(&map)?)?;
        Ok(map)
    }

    // Templates

    /// List templates, optionally narrowed to one logical id.
    pub fn get_templates(
        &self,
        template_id: Option<&str>,
        version: VersionSelector,
    ) -> Result<Vec<Template>, StoreError> {
        let predicate = match template_id {
            Some(id) => Predicate::field_eq("templateId", id),
            None => Predicate::True,
        };
        decode_all(self.versioned_query(TEMPLATES, "templateId", predicate, version)?)
    }

    /// Latest version of one template.
    pub fn get_template(&self, template_id: &str) -> Result<Template, StoreError> {
        self.get_templates(Some(template_id), VersionSelector::Latest)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))
    }

    /// Create a template at version 1.
    pub fn create_template(
        &self,
        revision: NewTemplate,
        user: &User,
    ) -> Result<Template, StoreError> {
        let template = Template {
            template_id: generate_id(),
            name: revision.name,
            version: 1,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            template: revision.template,
        };
        self.store
            .create(TEMPLATES, &template.template_id, encode(&template)?)?;
        Ok(template)
    }

    /// Append a new template version.
    pub fn update_template(
        &self,
        template_id: &str,
        revision: NewTemplate,
        user: &User,
        expected_version: Option<u64>,
    ) -> Result<Template, StoreError> {
        let latest = self.get_template(template_id)?;
        Self::check_expected(expected_version, latest.version)?;
        let template = Template {
            template_id: template_id.to_string(),
            name: revision.name,
            version: latest.version + 1,
            last_updated_by: user.username.clone(),
            last_updated_on: Utc::now(),
            template: revision.template,
        };
        self.store
            .create(TEMPLATES, &generate_id(), encode(&template)?)?;
        Ok(template)
    }

    /// Seed the given named templates when the store holds none.
    pub fn seed_default_templates(
        &self,
        defaults: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError> {
        if !self.get_templates(None, VersionSelector::Latest)?.is_empty() {
            return Ok(0);
        }
        let admin = User {
            name: "admin".to_string(),
            email: String::new(),
            username: "admin".to_string(),
            scopes: vec![],
        };
        for (name, template) in defaults {
            self.create_template(
                NewTemplate {
                    name: name.clone(),
                    template: template.clone(),
                },
                &admin,
            )?;
        }
        tracing::info!(count = defaults.len(), "seeded default node templates");
        Ok(defaults.len())
    }

    // User data

    /// Stored UI state for one user, if any.
    pub fn get_userdata(&self, user: &User) -> Result<Option<UserData>, StoreError> {
        let docs = self.store.query(
            USERDATA,
            &Predicate::field_eq("username", &user.username),
            &QueryOptions::default(),
        )?;
        Ok(decode_all(docs)?.into_iter().next())
    }

    /// Create UI state for a user.
    pub fn create_userdata(
        &self,
        revision: UserDataRevision,
        user: &User,
    ) -> Result<UserData, StoreError> {
        let userdata = UserData {
            username: user.username.clone(),
            favorites: revision.favorites,
            last_edited: revision.last_edited,
        };
        self.store
            .create(USERDATA, &user.username, encode(&userdata)?)?;
        Ok(userdata)
    }

    /// Replace UI state for a user, failing when none exists.
    pub fn update_userdata(
        &self,
        revision: UserDataRevision,
        user: &User,
    ) -> Result<UserData, StoreError> {
        if self.get_userdata(user)?.is_none() {
            return Err(StoreError::NotFound(format!(
                "user data for {}",
                user.username
            )));
        }
        let userdata = UserData {
            username: user.username.clone(),
            favorites: revision.favorites,
            last_edited: revision.last_edited,
        };
        self.store
            .update(USERDATA, &user.username, encode(&userdata)?)?;
        Ok(userdata)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::MemoryStore;
    use netmap_model::DatasetQuery;

    fn user() -> User {
        User {
            name: "Ops".into(),
            email: "ops@example.net".into(),
            username: "ops".into(),
            scopes: vec![],
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    fn revision(name: &str) -> DatasetRevision {
        DatasetRevision {
            name: name.into(),
            query: DatasetQuery {
                endpoint: "sheets?sheet_id=f1".into(),
                filters: vec![],
                node_deduplication_field: None,
                node_group_criteria: None,
                node_group_layout: None,
            },
        }
    }

    #[test]
    fn generated_ids_are_seven_alphanumerics() {
        let id = generate_id();
        assert_eq!(id.len(), 7);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn dataset_updates_append_versions_and_latest_collapses() {
        let catalog = catalog();
        let created = catalog.create_dataset(revision("backbone"), &user()).unwrap();
        assert_eq!(created.version, 1);

        catalog
            .update_dataset(&created.dataset_id, revision("backbone v2"), None, &user(), None)
            .unwrap();

        let latest = catalog.get_dataset(&created.dataset_id).unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.name, "backbone v2");

        let all = catalog
            .get_datasets(Some(&created.dataset_id), VersionSelector::All)
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let catalog = catalog();
        let created = catalog.create_dataset(revision("backbone"), &user()).unwrap();
        catalog
            .update_dataset(&created.dataset_id, revision("v2"), None, &user(), Some(1))
            .unwrap();
        let err = catalog
            .update_dataset(&created.dataset_id, revision("v3"), None, &user(), Some(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 2 }));
    }

    #[test]
    fn publish_copies_latest_with_public_flag() {
        let catalog = catalog();
        let map = catalog
            .create_map(
                MapRevision {
                    name: "espnet".into(),
                    overrides: BTreeMap::new(),
                    configuration: serde_json::from_value(serde_json::json!({
                        "layers": [],
                    }))
                    .unwrap(),
                },
                &user(),
            )
            .unwrap();
        assert_eq!(catalog.get_maps(None, VersionSelector::Latest, true).unwrap().len(), 0);

        let published = catalog.publish_map(&map.map_id, &user()).unwrap();
        assert_eq!(published.version, 2);
        assert_eq!(published.public, Some(true));
        assert_eq!(catalog.get_maps(None, VersionSelector::Latest, true).unwrap().len(), 1);
    }

    #[test]
    fn default_templates_seed_only_into_an_empty_store() {
        let catalog = catalog();
        let mut defaults = BTreeMap::new();
        defaults.insert("default".to_string(), "<g></g>".to_string());
        assert_eq!(catalog.seed_default_templates(&defaults).unwrap(), 1);
        assert_eq!(catalog.seed_default_templates(&defaults).unwrap(), 0);
    }

    #[test]
    fn userdata_update_requires_existing_row() {
        let catalog = catalog();
        let err = catalog
            .update_userdata(UserDataRevision::default(), &user())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        catalog
            .create_userdata(UserDataRevision::default(), &user())
            .unwrap();
        catalog
            .update_userdata(UserDataRevision::default(), &user())
            .unwrap();
        assert!(catalog.get_userdata(&user()).unwrap().is_some());
    }
}
