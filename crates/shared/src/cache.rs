//! Wallet state cache file: its derived name and its load/save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Network;
use crate::providers::private_state::write_atomically;
use crate::seed::Secret;

/// Hex characters of the secret used to tell cache files apart.
pub const CACHE_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache file {path} could not be read: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("cache file {path} could not be written: {reason}")]
    Unwritable { path: PathBuf, reason: String },
}

/// Which contract family a workflow belongs to. Families keep separate cache
/// files for the same secret and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheFamily {
    Counter,
    Registry,
}

impl CacheFamily {
    fn infix(&self) -> Option<&'static str> {
        match self {
            CacheFamily::Counter => None,
            CacheFamily::Registry => Some("patient-registry"),
        }
    }
}

pub fn default_cache_file_name(secret: &Secret, network: Network, family: CacheFamily) -> String {
    let prefix = secret.hex_prefix(CACHE_PREFIX_LEN);
    match family.infix() {
        Some(infix) => format!("{prefix}-{infix}-{network}.state"),
        None => format!("{prefix}-{network}.state"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCachePersister {
    path: PathBuf,
}

impl StateCachePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// An explicit `override_path` wins over the derived name under `state_dir`.
    pub fn resolve(
        state_dir: &Path,
        secret: &Secret,
        network: Network,
        family: CacheFamily,
        override_path: Option<&Path>,
    ) -> Self {
        match override_path {
            Some(path) => Self::new(path),
            None => Self::new(state_dir.join(default_cache_file_name(secret, network, family))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no cache exists yet.
    pub fn load(&self) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Unreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn save(&self, blob: &str) -> Result<(), CacheError> {
        write_atomically(&self.path, blob.as_bytes()).map_err(|e| CacheError::Unwritable {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}
