// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable storage port and JSON service for Reflow state.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw blobs keyed by a logical namespace.
pub trait ConfigStore {
    /// Load a raw blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw blob, replacing any previous value.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
    /// Drop the blob stored under `key`. Returns `NotFound` when missing.
    fn remove_raw(&self, key: &str) -> Result<(), ConfigError>;
}

/// Why a storage call failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing is stored under the key.
    #[error("key not found")]
    NotFound,
    /// The backing medium failed.
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    /// A value could not be encoded as JSON.
    #[error("encode: {0}")]
    Serde(#[from] serde_json::Error),
    /// A stored blob is not valid JSON for the requested type.
    #[error("stored value under `{key}` is corrupt: {source}")]
    Corrupt {
        /// Key whose blob failed to decode.
        key: String,
        /// Decoder error.
        source: serde_json::Error,
    },
    /// Adapter-specific failure.
    #[error("{0}")]
    Other(String),
}

impl ConfigError {
    /// True for [`ConfigError::NotFound`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// JSON codec over a [`ConfigStore`]. Absent and empty blobs read as `None`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the wrapped store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Decode the value under `key`.
    ///
    /// `Ok(None)` when the key is absent or holds an empty blob; a blob that
    /// does not decode as `T` is [`ConfigError::Corrupt`].
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        let bytes = match self.store.load_raw(key) {
            Err(ConfigError::NotFound) => return Ok(None),
            other => other?,
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Corrupt {
                key: key.to_owned(),
                source,
            })
    }

    /// Encode `value` as pretty JSON and store it under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize + ?Sized,
    {
        let blob = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &blob)
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub fn remove(&self, key: &str) -> Result<(), ConfigError> {
        self.store
            .remove_raw(key)
            .or_else(|err| if err.is_not_found() { Ok(()) } else { Err(err) })
    }
}
