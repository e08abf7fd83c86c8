use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported network: {0:?} (expected standalone, testnet, testnet-local or testnet-remote)")]
    UnsupportedNetwork(String),
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Standalone,
    TestnetLocal,
    TestnetRemote,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Standalone => "standalone",
            Network::TestnetLocal => "testnet-local",
            Network::TestnetRemote => "testnet-remote",
        }
    }

    /// Ledger network id the node expects in submitted transactions.
    pub fn network_id(&self) -> &'static str {
        match self {
            Network::Standalone => "undeployed",
            Network::TestnetLocal | Network::TestnetRemote => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a free-form network selector to a [`Network`].
///
/// Matching is case-insensitive. A missing selector and the bare `testnet`
/// alias both mean the remote test network.
pub fn resolve_network(requested: Option<&str>) -> Result<Network, ConfigError> {
    let Some(raw) = requested else {
        return Ok(Network::TestnetRemote);
    };

    match raw.trim().to_lowercase().as_str() {
        "testnet" | "testnet-remote" => Ok(Network::TestnetRemote),
        "testnet-local" => Ok(Network::TestnetLocal),
        "standalone" => Ok(Network::Standalone),
        _ => Err(ConfigError::UnsupportedNetwork(raw.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPolicy {
    /// Upper bound on the wait for a synced, funded wallet.
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// How long a single submission may wait for inclusion. Running out is
    /// terminal, since the transaction may land later.
    pub inclusion_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            inclusion_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub network: Network,
    pub node_url: Url,
    pub indexer_url: Url,
    pub proof_server_url: Url,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
    pub funding: FundingPolicy,
    pub submission: RetryPolicy,
}

const LOCAL_NODE: &str = "http://127.0.0.1:9944";
const LOCAL_INDEXER: &str = "http://127.0.0.1:8088/api/v1/graphql";
const LOCAL_PROOF_SERVER: &str = "http://127.0.0.1:6300";
const REMOTE_NODE: &str = "https://rpc.testnet-02.midnight.network";
const REMOTE_INDEXER: &str = "https://indexer.testnet-02.midnight.network/api/v1/graphql";

impl Config {
    pub fn for_network(network: Network) -> Self {
        let (node, indexer) = match network {
            Network::Standalone | Network::TestnetLocal => (LOCAL_NODE, LOCAL_INDEXER),
            Network::TestnetRemote => (REMOTE_NODE, REMOTE_INDEXER),
        };

        Self {
            network,
            node_url: static_url(node),
            indexer_url: static_url(indexer),
            proof_server_url: static_url(LOCAL_PROOF_SERVER),
            log_dir: PathBuf::from("logs").join(network.as_str()),
            state_dir: PathBuf::from("."),
            funding: FundingPolicy::default(),
            submission: RetryPolicy::default(),
        }
    }

    pub fn resolve(requested: Option<&str>) -> Result<Self, ConfigError> {
        resolve_network(requested).map(Self::for_network)
    }

    pub fn network_id(&self) -> &'static str {
        self.network.network_id()
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_funding_timeout(mut self, timeout: Duration) -> Self {
        self.funding.timeout = timeout;
        self
    }

    pub fn with_max_submit_attempts(mut self, attempts: u32) -> Self {
        self.submission.max_attempts = attempts.max(1);
        self
    }

    pub fn with_endpoints(
        mut self,
        node_url: &str,
        indexer_url: &str,
        proof_server_url: &str,
    ) -> Result<Self, ConfigError> {
        self.node_url = parse_endpoint(node_url)?;
        self.indexer_url = parse_endpoint(indexer_url)?;
        self.proof_server_url = parse_endpoint(proof_server_url)?;
        Ok(self)
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint(raw.to_string(), e.to_string()))
}

// Only called with the compile-time constants above.
fn static_url(raw: &'static str) -> Url {
    Url::parse(raw).unwrap_or_else(|e| panic!("built-in endpoint {raw} is invalid: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_remote_testnet() {
        assert_eq!(resolve_network(None).unwrap(), Network::TestnetRemote);
        assert_eq!(
            resolve_network(Some("testnet")).unwrap(),
            Network::TestnetRemote
        );
    }

    #[test]
    fn test_direct_identifiers() {
        assert_eq!(
            resolve_network(Some("standalone")).unwrap(),
            Network::Standalone
        );
        assert_eq!(
            resolve_network(Some("testnet-local")).unwrap(),
            Network::TestnetLocal
        );
        assert_eq!(
            resolve_network(Some("testnet-remote")).unwrap(),
            Network::TestnetRemote
        );
    }

    #[test]
    fn test_mixed_case_resolves_to_same_config() {
        let upper = Config::resolve(Some("TESTNET-LOCAL")).unwrap();
        let lower = Config::resolve(Some("testnet-local")).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.network, Network::TestnetLocal);
    }

    #[test]
    fn test_unsupported_network_names_the_value() {
        let err = Config::resolve(Some("unsupported-net")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedNetwork("unsupported-net".to_string())
        );
        assert!(err.to_string().contains("unsupported-net"));
    }

    #[test]
    fn test_network_ids() {
        assert_eq!(
            Config::for_network(Network::Standalone).network_id(),
            "undeployed"
        );
        assert_eq!(
            Config::for_network(Network::TestnetRemote).network_id(),
            "testnet"
        );
    }

    #[test]
    fn test_log_dir_is_per_network() {
        let config = Config::for_network(Network::TestnetLocal);
        assert_eq!(config.log_dir, PathBuf::from("logs/testnet-local"));
    }

    #[test]
    fn test_endpoint_override_rejects_garbage() {
        let config = Config::for_network(Network::Standalone);
        let err = config
            .with_endpoints("not a url", "http://localhost:1", "http://localhost:2")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(..)));
    }
}
