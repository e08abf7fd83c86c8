use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ContractAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deploy,
    Call,
}

/// A state transition ready to be proven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnprovenTransaction {
    pub kind: TransactionKind,
    pub network_id: String,
    pub contract: String,
    pub contract_address: ContractAddress,
    /// `None` for deployments.
    pub circuit: Option<String>,
    pub arguments: Value,
    /// Public ledger state after the transition.
    pub next_state: Value,
    pub coin_public_key: String,
}

impl UnprovenTransaction {
    pub fn label(&self) -> String {
        match &self.circuit {
            Some(circuit) => format!("{}.{circuit}", self.contract),
            None => format!("{} deployment", self.contract),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenTransaction {
    pub transaction: UnprovenTransaction,
    /// Hex-encoded proof bytes, opaque to this crate.
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_id: String,
    pub block_height: u64,
}
