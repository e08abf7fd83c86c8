//! Wallet lifecycle: build a signing context from the secret, keep it in sync
//! in the background and wait until it can pay for transactions.

pub mod source;
pub mod state;
pub mod sync;

use std::time::Duration;

use alloy::primitives::{keccak256, B256};
use alloy::signers::local::PrivateKeySigner;

use crate::lifecycle::Releasable;
use crate::seed::Secret;

pub use source::WalletSyncSource;
pub use state::{WalletSnapshot, WalletState};
pub use sync::{WalletConnector, WalletSession, WalletSynchronizer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("secret is not a usable signing key: {0}")]
    InvalidKey(String),
    #[error("wallet not synced and funded within {timeout:?} (synced {synced_height}/{network_height}, balance {balance})")]
    FundingTimeout {
        timeout: Duration,
        synced_height: u64,
        network_height: u64,
        balance: u128,
    },
    #[error("wallet sync stopped: {0}")]
    SyncStopped(String),
    #[error("sync source unreachable: {0}")]
    Unreachable(String),
    #[error("wallet state could not be serialized: {0}")]
    Snapshot(String),
}

impl WalletError {
    pub(crate) fn funding_timeout(timeout: Duration, state: WalletState) -> Self {
        WalletError::FundingTimeout {
            timeout,
            synced_height: state.synced_height,
            network_height: state.network_height,
            balance: state.balance,
        }
    }
}

/// A synchronized, funded wallet handed to the provider configurator.
pub trait Wallet: Releasable {
    /// Checksummed hex address of the signing key.
    fn address(&self) -> &str;
    fn signer(&self) -> &PrivateKeySigner;
    /// Public key that receives change and fees on this wallet's behalf.
    fn coin_public_key(&self) -> &str;
    fn state(&self) -> WalletState;
    /// Opaque blob for the state cache file.
    fn serialize_state(&self) -> Result<String, WalletError>;
}

pub fn signer_from_secret(secret: &Secret) -> Result<PrivateKeySigner, WalletError> {
    PrivateKeySigner::from_bytes(&B256::from(*secret.as_bytes()))
        .map_err(|e| WalletError::InvalidKey(e.to_string()))
}

pub fn coin_public_key(secret: &Secret) -> String {
    let mut preimage = b"coin-public-key:".to_vec();
    preimage.extend_from_slice(secret.as_bytes());
    hex::encode(keccak256(&preimage))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_is_deterministic_per_secret() {
        let secret = Secret::from_bytes([7u8; 32]);
        let a = signer_from_secret(&secret).unwrap();
        let b = signer_from_secret(&secret).unwrap();
        assert_eq!(a.address(), b.address());

        let other = signer_from_secret(&Secret::from_bytes([8u8; 32])).unwrap();
        assert_ne!(a.address(), other.address());
    }

    #[test]
    fn test_zero_secret_is_not_a_key() {
        let err = signer_from_secret(&Secret::from_bytes([0u8; 32])).unwrap_err();
        assert!(matches!(err, WalletError::InvalidKey(_)));
    }

    #[test]
    fn test_coin_public_key_shape() {
        let key = coin_public_key(&Secret::from_bytes([7u8; 32]));
        assert_eq!(key.len(), 64);
        assert_ne!(key, coin_public_key(&Secret::from_bytes([8u8; 32])));
    }
}
