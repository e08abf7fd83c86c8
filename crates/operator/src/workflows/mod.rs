pub(crate) mod counter;
pub(crate) mod registry;

use shared::contract::{Contract, ContractSession, TxReceipt};
use shared::lifecycle::Releasable;

/// A contract deployed by this run, with the receipt of its deployment.
pub(crate) struct Deployed<C: Contract> {
    pub(crate) session: ContractSession<C>,
    pub(crate) receipt: TxReceipt,
}

impl<C: Contract> Releasable for Deployed<C> {
    fn resource_name(&self) -> &str {
        self.session.resource_name()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;

    use alloy::signers::local::PrivateKeySigner;
    use async_trait::async_trait;
    use shared::cache::StateCachePersister;
    use shared::config::{Config, Network};
    use shared::logging::{LogSink, MemorySink};
    use shared::providers::memory::{
        InMemoryLedger, InMemoryPrivateStateStore, LocalProofProvider, ScriptedSubmitter,
    };
    use shared::providers::{ProviderBundle, ProviderError, ProviderFactory};
    use shared::seed::Secret;
    use shared::wallet::{Wallet, WalletConnector, WalletError, WalletSnapshot, WalletState};
    use shared::workflow::{WorkflowEnv, WorkflowRunner};
    use shared::Error;

    pub(crate) struct StaticWallet {
        signer: PrivateKeySigner,
        address: String,
    }

    impl StaticWallet {
        pub(crate) fn new() -> Self {
            let signer: PrivateKeySigner =
                "0000000000000000000000000000000000000000000000000000000000000003"
                    .parse()
                    .unwrap();
            Self {
                address: signer.address().to_string(),
                signer,
            }
        }
    }

    impl shared::lifecycle::Releasable for StaticWallet {
        fn resource_name(&self) -> &str {
            "wallet"
        }
    }

    impl Wallet for StaticWallet {
        fn address(&self) -> &str {
            &self.address
        }

        fn signer(&self) -> &PrivateKeySigner {
            &self.signer
        }

        fn coin_public_key(&self) -> &str {
            "static-coin-key"
        }

        fn state(&self) -> WalletState {
            WalletState {
                synced_height: 1,
                network_height: 1,
                balance: 10,
            }
        }

        fn serialize_state(&self) -> Result<String, WalletError> {
            serde_json::to_string(&WalletSnapshot::new(&self.address, self.state()))
                .map_err(|e| WalletError::Snapshot(e.to_string()))
        }
    }

    fn memory_bundle(ledger: &InMemoryLedger) -> ProviderBundle {
        ProviderBundle {
            private_state: Arc::new(InMemoryPrivateStateStore::new()),
            public_data: Arc::new(ledger.clone()),
            proof: Arc::new(LocalProofProvider::new()),
            submitter: Arc::new(ScriptedSubmitter::with_ledger(ledger.clone(), vec![])),
            coin_public_key: "static-coin-key".into(),
            network_id: "undeployed".into(),
        }
    }

    fn memory_config() -> Config {
        let mut config = Config::for_network(Network::Standalone);
        config.submission.initial_delay = std::time::Duration::from_millis(1);
        config
    }

    /// Environment backed by one in-memory ledger; envs sharing `ledger` see
    /// each other's contracts.
    pub(crate) fn memory_env(ledger: &InMemoryLedger, sink: &Arc<MemorySink>) -> WorkflowEnv {
        WorkflowEnv {
            config: memory_config(),
            wallet: Arc::new(StaticWallet::new()),
            providers: memory_bundle(ledger),
            log: sink.clone(),
        }
    }

    struct StaticConnector;

    #[async_trait]
    impl WalletConnector for StaticConnector {
        async fn connect(
            &self,
            _config: &Config,
            _secret: &Secret,
            _cache: &StateCachePersister,
            _log: Arc<dyn LogSink>,
        ) -> Result<Arc<dyn Wallet>, Error> {
            Ok(Arc::new(StaticWallet::new()) as Arc<dyn Wallet>)
        }
    }

    struct MemoryFactory {
        ledger: InMemoryLedger,
    }

    impl ProviderFactory for MemoryFactory {
        fn configure(
            &self,
            _wallet: &Arc<dyn Wallet>,
            _config: &Config,
            _log: Arc<dyn LogSink>,
        ) -> Result<ProviderBundle, ProviderError> {
            Ok(memory_bundle(&self.ledger))
        }
    }

    /// Full runner over the in-memory ledger, caching under `state_dir`.
    pub(crate) fn memory_runner(
        state_dir: &Path,
        ledger: &InMemoryLedger,
        sink: &Arc<MemorySink>,
    ) -> WorkflowRunner {
        WorkflowRunner::new(
            memory_config().with_state_dir(state_dir),
            Secret::from_bytes([7u8; 32]),
            sink.clone(),
        )
        .with_connector(Arc::new(StaticConnector))
        .with_provider_factory(Arc::new(MemoryFactory {
            ledger: ledger.clone(),
        }))
    }
}
