use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::state::WalletState;
use crate::providers::{IndexerClient, ProviderError};

const WALLET_SYNC_QUERY: &str = "query WalletSync($address: String!, $fromHeight: Int!) { \
    walletSyncProgress(address: $address, fromHeight: $fromHeight) { \
    syncedHeight networkHeight balance } }";

/// Where the background sync task learns about the wallet's chain view.
#[async_trait]
pub trait WalletSyncSource: Send + Sync {
    async fn poll(&self, address: &str, current: &WalletState)
        -> Result<WalletState, ProviderError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletSyncData {
    wallet_sync_progress: SyncProgress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncProgress {
    synced_height: u64,
    network_height: u64,
    /// Decimal string; balances exceed JSON's safe integer range.
    balance: String,
}

#[async_trait]
impl WalletSyncSource for IndexerClient {
    async fn poll(
        &self,
        address: &str,
        current: &WalletState,
    ) -> Result<WalletState, ProviderError> {
        let data: WalletSyncData = self
            .query(
                WALLET_SYNC_QUERY,
                json!({ "address": address, "fromHeight": current.synced_height }),
            )
            .await?;
        let progress = data.wallet_sync_progress;
        let balance = progress.balance.parse::<u128>().map_err(|e| {
            ProviderError::Malformed(format!("balance {:?}: {e}", progress.balance))
        })?;

        Ok(WalletState {
            synced_height: progress.synced_height,
            network_height: progress.network_height,
            balance,
        })
    }
}
