// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for Reflow (uses the platform data dir).

use directories::ProjectDirs;
use reflow_app_core::config::{ConfigError, ConfigStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BLOB_EXT: &str = "json";
const STAGED_EXT: &str = "json.tmp";

/// Store blobs as JSON files, one file per key.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

/// `NotFound` from the filesystem is the port's `NotFound`; anything else is I/O.
fn missing_as_not_found(err: io::Error) -> ConfigError {
    match err.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound,
        _ => ConfigError::Io(err),
    }
}

impl FsConfigStore {
    /// Store under the platform data dir (`~/.local/share/reflow` on Linux).
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("dev", "flyingrobots", "Reflow").ok_or_else(|| {
            ConfigError::Other("no home directory to derive a data dir from".into())
        })?;
        Self::with_base(dirs.data_dir())
    }

    /// Store under `base`, creating it if needed.
    pub fn with_base(base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the blobs.
    pub fn base(&self) -> &Path {
        &self.base
    }

    // Keys contain dots (`reflow.materials`), so the suffix is appended, never swapped.
    fn blob_path(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.{BLOB_EXT}"))
    }

    fn staged_path(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.{STAGED_EXT}"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        fs::read(self.blob_path(key)).map_err(missing_as_not_found)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let target = self.blob_path(key);
        // Write aside, then rename over: readers see the old blob or the new one.
        let staged = self.staged_path(key);
        fs::write(&staged, data)?;
        fs::rename(&staged, &target)?;
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), ConfigError> {
        fs::remove_file(self.blob_path(key)).map_err(missing_as_not_found)
    }
}
