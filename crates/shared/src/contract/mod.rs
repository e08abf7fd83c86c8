pub mod circuits;
pub mod retry;
pub mod session;
pub mod transaction;

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use circuits::{
    CircuitCall, Contract, CounterContract, CounterLedger, GuardViolation, Increment,
    RegisterPatient, RegistryContract, RegistryLedger, RegistryPrivateState, RegistryStats,
};
pub use session::ContractSession;
pub use transaction::{ProvenTransaction, TransactionKind, TxReceipt, UnprovenTransaction};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("no readable contract at address {0}")]
    NotFound(ContractAddress),
    #[error("circuit {circuit} rejected its inputs: {condition}")]
    GuardFailed { circuit: String, condition: String },
    #[error("proof generation failed: {0}")]
    ProvingFailed(String),
    #[error("transaction submission failed after {attempts} attempt(s): {reason}")]
    SubmissionFailed { attempts: u32, reason: String },
    #[error("transaction rejected by the node: {0}")]
    Rejected(String),
    #[error("failed to read ledger state: {0}")]
    Transport(String),
    #[error("contract state could not be decoded: {0}")]
    Decode(String),
    #[error("private state store: {0}")]
    PrivateState(String),
}

impl From<GuardViolation> for ContractError {
    fn from(violation: GuardViolation) -> Self {
        ContractError::GuardFailed {
            circuit: violation.circuit.to_string(),
            condition: violation.condition,
        }
    }
}

/// Address of a deployed contract instance: 32 bytes, shown as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(hex_part.to_lowercase()))
    }

    /// Address for a new instance of `contract` deployed by `deployer`.
    ///
    /// The nonce makes repeated deployments by the same key distinct.
    pub fn derive(contract: &str, deployer: &str, nonce: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(contract.as_bytes());
        hasher.update(deployer.as_bytes());
        hasher.update(nonce);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn random_nonce() -> [u8; 32] {
        let mut nonce = [0u8; 32];
        rand::rng().fill_bytes(&mut nonce);
        nonce
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
