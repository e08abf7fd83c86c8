use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Network;
use crate::contract::{ContractAddress, RegistryStats};
use crate::providers::private_state::write_atomically;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("deployment record {0} does not exist")]
    Missing(PathBuf),
    #[error("deployment record {path} could not be read: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("deployment record {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("deployment record {path} could not be written: {reason}")]
    Unwritable { path: PathBuf, reason: String },
}

/// What `deploy-registry` leaves behind for later verification runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_address: ContractAddress,
    pub transaction_hash: String,
    #[serde(with = "rfc3339")]
    pub deployed_at: DateTime<Utc>,
    pub network: String,
    pub deployer: String,
    pub initial_state: RegistryStats,
}

impl DeploymentRecord {
    pub fn new(
        contract_address: ContractAddress,
        transaction_hash: impl Into<String>,
        network: Network,
        deployer: impl Into<String>,
        initial_state: RegistryStats,
    ) -> Self {
        Self {
            contract_address,
            transaction_hash: transaction_hash.into(),
            deployed_at: Utc::now(),
            network: network.to_string(),
            deployer: deployer.into(),
            initial_state,
        }
    }

    /// True when the record was made on `network`. The stored value is never
    /// rewritten.
    pub fn matches_network(&self, network: Network) -> bool {
        self.network == network.as_str()
    }

    pub fn read(path: &Path) -> Result<Self, RecordError> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RecordError::Missing(path.to_path_buf()),
            _ => RecordError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        serde_json::from_str(&contents).map_err(|e| RecordError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), RecordError> {
        let unwritable = |reason: String| RecordError::Unwritable {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| unwritable(e.to_string()))?;
        write_atomically(path, json.as_bytes()).map_err(|e| unwritable(e.to_string()))
    }
}

mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(at))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// `deployedAt` as written to disk.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
