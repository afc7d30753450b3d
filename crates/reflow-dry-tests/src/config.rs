// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory storage fake for testing without filesystem I/O.

use reflow_app_core::config::{ConfigError, ConfigStore};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One of the three [`ConfigStore`] operations, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `load_raw`
    Load,
    /// `save_raw`
    Save,
    /// `remove_raw`
    Remove,
}

impl StoreOp {
    const fn slot(self) -> usize {
        match self {
            Self::Load => 0,
            Self::Save => 1,
            Self::Remove => 2,
        }
    }
}

/// Blob store held in memory.
///
/// Clones share one backing map: hand one clone to the code under test and
/// inspect it through another. Every call is counted per [`StoreOp`], and any
/// operation can be made to fail with [`ConfigError::Other`].
///
/// # Example
///
/// ```
/// use reflow_dry_tests::{InMemoryConfigStore, StoreOp};
/// use reflow_app_core::config::ConfigService;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// service.save("simulation", &serde_json::json!({"enabled": false})).unwrap();
/// assert_eq!(store.calls(StoreOp::Save), 1);
/// assert_eq!(store.keys(), vec!["simulation".to_string()]);
///
/// store.fail(StoreOp::Load, true);
/// assert!(service.load::<serde_json::Value>("simulation").is_err());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    blobs: BTreeMap<String, Vec<u8>>,
    calls: [usize; 3],
    faults: HashSet<StoreOp>,
}

impl State {
    fn enter(&mut self, op: StoreOp) -> Result<(), ConfigError> {
        self.calls[op.slot()] += 1;
        if self.faults.contains(&op) {
            return Err(ConfigError::Other(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

impl InMemoryConfigStore {
    /// Empty store, no faults.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a blob directly. Not counted and never fails; use it to plant
    /// corrupt or legacy records.
    pub fn put_raw(&self, key: &str, blob: impl Into<Vec<u8>>) {
        self.state().blobs.insert(key.to_owned(), blob.into());
    }

    /// Read a blob directly. Not counted and never fails.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.state().blobs.get(key).cloned()
    }

    /// Whether `key` currently holds a blob.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state().blobs.contains_key(key)
    }

    /// Keys present, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state().blobs.keys().cloned().collect()
    }

    /// Make `op` fail (or stop failing). A failing call is still counted.
    pub fn fail(&self, op: StoreOp, failing: bool) {
        let mut state = self.state();
        if failing {
            state.faults.insert(op);
        } else {
            state.faults.remove(&op);
        }
    }

    /// How many times `op` was attempted.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state().calls[op.slot()]
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut state = self.state();
        state.enter(StoreOp::Load)?;
        state.blobs.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut state = self.state();
        state.enter(StoreOp::Save)?;
        state.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), ConfigError> {
        let mut state = self.state();
        state.enter(StoreOp::Remove)?;
        match state.blobs.remove(key) {
            Some(_) => Ok(()),
            None => Err(ConfigError::NotFound),
        }
    }
}
