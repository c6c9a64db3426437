// SPDX-License-Identifier: Apache-2.0
//! Configuration port.
//!
//! The daemon reads its settings through a [`ConfigService`] over a
//! pluggable [`ConfigStore`], so settings loading stays testable with
//! an in-memory store. A store holds opaque blobs keyed by logical
//! name; all JSON handling lives in the service.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Blob storage for config values, keyed by logical name.
pub trait ConfigStore {
    /// Read the blob under `key`, [`ConfigError::NotFound`] when absent.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Write the blob under `key`, creating or replacing it.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No blob stored under the requested key.
    #[error("not found")]
    NotFound,
    /// Underlying storage failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob is not the expected JSON shape.
    #[error("config decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Typed config access over a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S: ConfigStore> ConfigService<S> {
    /// Service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The stored value under `key`, `None` when absent or empty.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Persist `value` under `key` as pretty-printed JSON.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        self.store.save_raw(key, &serde_json::to_vec_pretty(value)?)
    }

    /// The stored value under `key`, or the type's default persisted
    /// back to the store. The flag reports whether defaults were
    /// written.
    pub fn load_or_init<T>(&self, key: &str) -> Result<(T, bool), ConfigError>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        if let Some(value) = self.load(key)? {
            return Ok((value, false));
        }
        let value = T::default();
        self.save(key, &value)?;
        Ok((value, true))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    struct MemStore(RefCell<BTreeMap<String, Vec<u8>>>);

    impl MemStore {
        fn empty() -> Self {
            Self(RefCell::new(BTreeMap::new()))
        }
    }

    impl ConfigStore for MemStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0
                .borrow()
                .get(key)
                .cloned()
                .ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn round_trips_values_and_reports_missing_as_none() {
        let service = ConfigService::new(MemStore::empty());
        assert_eq!(service.load::<u32>("absent").unwrap(), None);
        service.save("port", &3000u16).unwrap();
        assert_eq!(service.load::<u16>("port").unwrap(), Some(3000));
    }

    #[test]
    fn load_or_init_persists_defaults_once() {
        let service = ConfigService::new(MemStore::empty());
        let (value, initialized) = service.load_or_init::<u32>("retries").unwrap();
        assert_eq!((value, initialized), (0, true));

        service.save("retries", &7u32).unwrap();
        let (value, initialized) = service.load_or_init::<u32>("retries").unwrap();
        assert_eq!((value, initialized), (7, false));
    }
}
