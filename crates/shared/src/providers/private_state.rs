use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{PrivateStateStore, ProviderError};
use crate::contract::ContractAddress;
use crate::lifecycle::{Releasable, ReleaseError};
use crate::logging::LogSink;

/// Private contract state persisted as one JSON object per wallet, keyed by
/// contract address.
pub struct FilePrivateStateStore {
    path: PathBuf,
    states: Mutex<HashMap<ContractAddress, Value>>,
    closed: AtomicBool,
}

impl FilePrivateStateStore {
    pub fn open(path: PathBuf, log: Arc<dyn LogSink>) -> Result<Self, ProviderError> {
        let states = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                ProviderError::Storage(format!("{} is not valid JSON: {e}", path.display()))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log.debug(&format!(
                    "No private state at {}, starting empty",
                    path.display()
                ));
                HashMap::new()
            }
            Err(e) => {
                return Err(ProviderError::Storage(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            states: Mutex::new(states),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, states: &HashMap<ContractAddress, Value>) -> Result<(), ProviderError> {
        let json = serde_json::to_vec_pretty(states)
            .map_err(|e| ProviderError::Storage(e.to_string()))?;
        write_atomically(&self.path, &json)
            .map_err(|e| ProviderError::Storage(format!("cannot write {}: {e}", self.path.display())))
    }

    fn ensure_open(&self) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Storage("store already closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PrivateStateStore for FilePrivateStateStore {
    async fn get(&self, address: &ContractAddress) -> Result<Option<Value>, ProviderError> {
        self.ensure_open()?;
        let states = self
            .states
            .lock()
            .map_err(|_| ProviderError::Storage("lock poisoned".into()))?;
        Ok(states.get(address).cloned())
    }

    async fn set(&self, address: &ContractAddress, state: Value) -> Result<(), ProviderError> {
        self.ensure_open()?;
        let mut states = self
            .states
            .lock()
            .map_err(|_| ProviderError::Storage("lock poisoned".into()))?;
        states.insert(address.clone(), state);
        self.flush(&states)
    }
}

#[async_trait]
impl Releasable for FilePrivateStateStore {
    fn resource_name(&self) -> &str {
        "private state store"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let states = self
            .states
            .lock()
            .map_err(|_| ReleaseError::new(self.resource_name(), "lock poisoned"))?;
        if states.is_empty() {
            return Ok(());
        }
        self.flush(&states)
            .map_err(|e| ReleaseError::new(self.resource_name(), e))
    }
}

/// Writes through a temp file in the target directory, then renames it over
/// `path`, so readers never see a half-written file.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemorySink};
    use serde_json::json;

    fn address(byte: &str) -> ContractAddress {
        ContractAddress::parse(&byte.repeat(32)).unwrap()
    }

    #[tokio::test]
    async fn test_set_persists_and_reopen_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private-state.json");

        let store = FilePrivateStateStore::open(path.clone(), MemorySink::new()).unwrap();
        assert_eq!(store.get(&address("aa")).await.unwrap(), None);
        store
            .set(&address("aa"), json!({ "registeredConditions": [] }))
            .await
            .unwrap();
        store.release().await.unwrap();

        let reopened = FilePrivateStateStore::open(path, MemorySink::new()).unwrap();
        assert_eq!(
            reopened.get(&address("aa")).await.unwrap(),
            Some(json!({ "registeredConditions": [] }))
        );
        assert_eq!(reopened.get(&address("bb")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_store_refuses_access() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FilePrivateStateStore::open(dir.path().join("state.json"), MemorySink::new()).unwrap();
        store.release().await.unwrap();
        store.release().await.unwrap();

        assert!(matches!(
            store.get(&address("aa")).await,
            Err(ProviderError::Storage(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FilePrivateStateStore::open(path, MemorySink::new()),
            Err(ProviderError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_untouched_store_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let sink = MemorySink::new();
        let store = FilePrivateStateStore::open(path.clone(), sink.clone()).unwrap();

        store.release().await.unwrap();
        assert!(!path.exists());
        assert!(sink.messages_at(LogLevel::Debug)[0].contains("starting empty"));
    }
}
