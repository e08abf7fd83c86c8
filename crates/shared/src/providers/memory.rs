//! In-process stand-ins for the network collaborators. They let a contract
//! session run end-to-end with no node, indexer or proof server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::keccak256;
use async_trait::async_trait;
use serde_json::Value;

use super::{PrivateStateStore, ProofProvider, ProviderError, PublicDataReader, TransactionSubmitter};
use crate::contract::{ContractAddress, ProvenTransaction, TxReceipt, UnprovenTransaction};
use crate::lifecycle::{Releasable, ReleaseError};

/// Public ledger shared by a reader and a submitter: submitted transactions
/// become visible to subsequent reads.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    contracts: Arc<Mutex<HashMap<ContractAddress, Value>>>,
    height: Arc<AtomicU64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: ContractAddress, state: Value) {
        if let Ok(mut contracts) = self.contracts.lock() {
            contracts.insert(address, state);
        }
    }

    pub fn get(&self, address: &ContractAddress) -> Option<Value> {
        self.contracts
            .lock()
            .ok()
            .and_then(|contracts| contracts.get(address).cloned())
    }

    fn include(&self, tx: &ProvenTransaction) -> TxReceipt {
        self.insert(
            tx.transaction.contract_address.clone(),
            tx.transaction.next_state.clone(),
        );
        let block_height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        TxReceipt {
            transaction_id: hex::encode(keccak256(tx.proof.as_bytes())),
            block_height,
        }
    }
}

#[async_trait]
impl PublicDataReader for InMemoryLedger {
    async fn contract_state(
        &self,
        address: &ContractAddress,
    ) -> Result<Option<Value>, ProviderError> {
        Ok(self.get(address))
    }
}

/// Submitter that plays back a script of failures before succeeding.
///
/// Once the script is exhausted every submission is included, either into
/// the attached [`InMemoryLedger`] or, without one, with a synthetic receipt.
#[derive(Debug, Default)]
pub struct ScriptedSubmitter {
    script: Mutex<VecDeque<Result<(), ProviderError>>>,
    ledger: Option<InMemoryLedger>,
    calls: AtomicU32,
    height: AtomicU64,
}

impl ScriptedSubmitter {
    pub fn new(script: Vec<Result<(), ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn with_ledger(ledger: InMemoryLedger, script: Vec<Result<(), ProviderError>>) -> Self {
        Self {
            ledger: Some(ledger),
            ..Self::new(script)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSubmitter for ScriptedSubmitter {
    async fn submit(&self, tx: &ProvenTransaction) -> Result<TxReceipt, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .map_err(|_| ProviderError::Transient("script lock poisoned".into()))?
            .pop_front();
        if let Some(Err(err)) = scripted {
            return Err(err);
        }

        Ok(match &self.ledger {
            Some(ledger) => ledger.include(tx),
            None => TxReceipt {
                transaction_id: hex::encode(keccak256(tx.proof.as_bytes())),
                block_height: self.height.fetch_add(1, Ordering::SeqCst) + 1,
            },
        })
    }
}

/// "Proves" by hashing the transaction. Proof bytes are opaque to every
/// consumer, so a digest is enough to make them distinct.
#[derive(Debug, Default)]
pub struct LocalProofProvider {
    proved: AtomicU32,
}

impl LocalProofProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proved(&self) -> u32 {
        self.proved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProofProvider for LocalProofProvider {
    async fn prove(&self, tx: UnprovenTransaction) -> Result<ProvenTransaction, ProviderError> {
        let bytes = serde_json::to_vec(&tx).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let nonce = self.proved.fetch_add(1, Ordering::SeqCst);
        let mut preimage = bytes;
        preimage.extend_from_slice(&nonce.to_be_bytes());
        Ok(ProvenTransaction {
            transaction: tx,
            proof: hex::encode(keccak256(&preimage)),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPrivateStateStore {
    states: Mutex<HashMap<ContractAddress, Value>>,
    releases: AtomicU32,
}

impl InMemoryPrivateStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Releasable for InMemoryPrivateStateStore {
    fn resource_name(&self) -> &str {
        "private state store"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PrivateStateStore for InMemoryPrivateStateStore {
    async fn get(&self, address: &ContractAddress) -> Result<Option<Value>, ProviderError> {
        let states = self
            .states
            .lock()
            .map_err(|_| ProviderError::Storage("lock poisoned".into()))?;
        Ok(states.get(address).cloned())
    }

    async fn set(&self, address: &ContractAddress, state: Value) -> Result<(), ProviderError> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| ProviderError::Storage("lock poisoned".into()))?;
        states.insert(address.clone(), state);
        Ok(())
    }
}
