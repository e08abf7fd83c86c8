use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Sync progress and spendable balance as last reported by the sync source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub synced_height: u64,
    pub network_height: u64,
    pub balance: u128,
}

impl WalletState {
    /// Caught up with a chain the source has actually seen.
    pub fn is_synced(&self) -> bool {
        self.network_height > 0 && self.synced_height >= self.network_height
    }

    pub fn is_funded(&self) -> bool {
        self.is_synced() && self.balance > 0
    }

    pub fn progress_percent(&self) -> u8 {
        if self.network_height == 0 {
            return 0;
        }
        let ratio = self.synced_height.min(self.network_height) as u128 * 100
            / self.network_height as u128;
        ratio as u8
    }
}

/// Serialized form of a wallet kept in the cache file between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub version: u32,
    pub address: String,
    pub state: WalletState,
}

impl WalletSnapshot {
    pub fn new(address: impl Into<String>, state: WalletState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            address: address.into(),
            state,
        }
    }

    /// `None` for anything this version cannot use; the caller starts fresh.
    pub fn decode(blob: &str, expected_address: &str) -> Option<WalletState> {
        let snapshot: WalletSnapshot = serde_json::from_str(blob).ok()?;
        (snapshot.version == SNAPSHOT_VERSION && snapshot.address == expected_address)
            .then_some(snapshot.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_requires_known_network_height() {
        assert!(!WalletState::default().is_synced());

        let caught_up = WalletState {
            synced_height: 10,
            network_height: 10,
            balance: 0,
        };
        assert!(caught_up.is_synced());
        assert!(!caught_up.is_funded());

        let funded = WalletState {
            balance: 5,
            ..caught_up
        };
        assert!(funded.is_funded());
    }

    #[test]
    fn test_progress_percent() {
        let state = WalletState {
            synced_height: 25,
            network_height: 100,
            balance: 0,
        };
        assert_eq!(state.progress_percent(), 25);
        assert_eq!(WalletState::default().progress_percent(), 0);
    }

    #[test]
    fn test_snapshot_decode_checks_owner_and_version() {
        let state = WalletState {
            synced_height: 3,
            network_height: 4,
            balance: 9,
        };
        let blob = serde_json::to_string(&WalletSnapshot::new("0xabc", state)).unwrap();

        assert_eq!(WalletSnapshot::decode(&blob, "0xabc"), Some(state));
        assert_eq!(WalletSnapshot::decode(&blob, "0xdef"), None);
        assert_eq!(WalletSnapshot::decode("{ not json", "0xabc"), None);

        let future = blob.replace("\"version\":1", "\"version\":2");
        assert_eq!(WalletSnapshot::decode(&future, "0xabc"), None);
    }
}
