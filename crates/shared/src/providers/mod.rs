//! Collaborator handles a contract session needs, and the factory that binds
//! them to a wallet and a [`Config`].

pub mod indexer;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod node;
pub mod private_state;
pub mod proof_server;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::contract::{ContractAddress, ProvenTransaction, TxReceipt, UnprovenTransaction};
use crate::lifecycle::{Releasable, ReleaseError};
use crate::logging::LogSink;
use crate::wallet::Wallet;

pub use indexer::IndexerClient;
pub use node::NodeSubmitter;
pub use private_state::FilePrivateStateStore;
pub use proof_server::ProofServerClient;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid {name} endpoint: {reason}")]
    InvalidEndpoint { name: &'static str, reason: String },
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("private state storage: {0}")]
    Storage(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classifies a transport-level failure. Anything that never produced an
    /// HTTP status is worth retrying.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.is_client_error() && status.as_u16() != 429 => {
                ProviderError::Rejected(err.to_string())
            }
            _ => ProviderError::Transient(err.to_string()),
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status.as_u16() == 429 {
            ProviderError::Transient(format!("HTTP {status}: {body}"))
        } else {
            ProviderError::Rejected(format!("HTTP {status}: {body}"))
        }
    }
}

/// Off-chain contract state, kept per contract address.
#[async_trait]
pub trait PrivateStateStore: Releasable {
    async fn get(&self, address: &ContractAddress) -> Result<Option<Value>, ProviderError>;
    async fn set(&self, address: &ContractAddress, state: Value) -> Result<(), ProviderError>;
}

/// Read access to public ledger state.
#[async_trait]
pub trait PublicDataReader: Send + Sync {
    /// `Ok(None)` when no contract lives at `address`.
    async fn contract_state(&self, address: &ContractAddress)
        -> Result<Option<Value>, ProviderError>;
}

#[async_trait]
pub trait ProofProvider: Send + Sync {
    async fn prove(&self, tx: UnprovenTransaction) -> Result<ProvenTransaction, ProviderError>;
}

/// Balances, signs and submits a proven transaction, resolving once it is
/// included in a block.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, tx: &ProvenTransaction) -> Result<TxReceipt, ProviderError>;
}

#[derive(Clone)]
pub struct ProviderBundle {
    pub private_state: Arc<dyn PrivateStateStore>,
    pub public_data: Arc<dyn PublicDataReader>,
    pub proof: Arc<dyn ProofProvider>,
    pub submitter: Arc<dyn TransactionSubmitter>,
    pub coin_public_key: String,
    pub network_id: String,
}

#[async_trait]
impl Releasable for ProviderBundle {
    fn resource_name(&self) -> &str {
        "provider bundle"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        self.private_state.release().await
    }
}

pub trait ProviderFactory: Send + Sync {
    fn configure(
        &self,
        wallet: &Arc<dyn Wallet>,
        config: &Config,
        log: Arc<dyn LogSink>,
    ) -> Result<ProviderBundle, ProviderError>;
}

/// Builds the production bundle: a file-backed private-state store and HTTP
/// clients for the indexer, the proof server and the node.
#[derive(Debug, Default, Clone)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn configure(
        &self,
        wallet: &Arc<dyn Wallet>,
        config: &Config,
        log: Arc<dyn LogSink>,
    ) -> Result<ProviderBundle, ProviderError> {
        let private_state = FilePrivateStateStore::open(
            config
                .state_dir
                .join(format!("private-state-{}.json", wallet.address())),
            log.clone(),
        )?;
        let public_data = IndexerClient::new(config.indexer_url.clone(), log.clone())?;
        let proof = ProofServerClient::new(endpoint(&config.proof_server_url, "prove", "proof server")?)?;
        let submitter = NodeSubmitter::new(
            endpoint(&config.node_url, "transactions", "node")?,
            wallet.signer().clone(),
            log,
        )?;

        Ok(ProviderBundle {
            private_state: Arc::new(private_state),
            public_data: Arc::new(public_data),
            proof: Arc::new(proof),
            submitter: Arc::new(submitter),
            coin_public_key: wallet.coin_public_key().to_string(),
            network_id: config.network_id().to_string(),
        })
    }
}

fn endpoint(base: &Url, path: &str, name: &'static str) -> Result<Url, ProviderError> {
    if base.cannot_be_a_base() {
        return Err(ProviderError::InvalidEndpoint {
            name,
            reason: format!("{base} cannot carry a path"),
        });
    }
    let mut joined = base.clone();
    joined
        .path_segments_mut()
        .map_err(|_| ProviderError::InvalidEndpoint {
            name,
            reason: format!("{base} cannot carry a path"),
        })?
        .pop_if_empty()
        .push(path);
    Ok(joined)
}

pub(crate) fn http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("health-ledger-operator/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}
