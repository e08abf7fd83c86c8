//! Drives one operator workflow from a resolved config to a saved wallet
//! cache, releasing everything it acquired on the way out.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheFamily, StateCachePersister};
use crate::config::Config;
use crate::error::Error;
use crate::lifecycle::{Releasable, ResourceScope};
use crate::logging::LogSink;
use crate::providers::{HttpProviderFactory, ProviderBundle, ProviderFactory};
use crate::seed::Secret;
use crate::wallet::{Wallet, WalletConnector, WalletSynchronizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowStage {
    Init,
    ConfigResolved,
    WalletReady,
    ProvidersReady,
    SessionReady,
    OperationComplete,
    StateSaved,
    Failed,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Init => "init",
            WorkflowStage::ConfigResolved => "config-resolved",
            WorkflowStage::WalletReady => "wallet-ready",
            WorkflowStage::ProvidersReady => "providers-ready",
            WorkflowStage::SessionReady => "session-ready",
            WorkflowStage::OperationComplete => "operation-complete",
            WorkflowStage::StateSaved => "state-saved",
            WorkflowStage::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a workflow may use once the wallet and providers are up.
pub struct WorkflowEnv {
    pub config: Config,
    pub wallet: Arc<dyn Wallet>,
    pub providers: ProviderBundle,
    pub log: Arc<dyn LogSink>,
}

#[async_trait]
pub trait Workflow: Send + Sync {
    /// Handle opened against the contract; released with everything else.
    type Session: Releasable + 'static;
    type Output: Send;

    fn name(&self) -> &'static str;
    fn family(&self) -> CacheFamily;

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error>;

    async fn operate(
        &self,
        env: &WorkflowEnv,
        session: &Self::Session,
    ) -> Result<Self::Output, Error>;
}

/// Outcome of a finished run.
#[derive(Debug)]
pub struct WorkflowReport<T> {
    pub output: T,
    pub cache_file: PathBuf,
    pub release_failures: usize,
}

pub struct WorkflowRunner {
    config: Config,
    secret: Secret,
    cache_override: Option<PathBuf>,
    connector: Arc<dyn WalletConnector>,
    provider_factory: Arc<dyn ProviderFactory>,
    log: Arc<dyn LogSink>,
}

impl WorkflowRunner {
    /// Runner wired to the production wallet synchronizer and HTTP providers.
    pub fn new(config: Config, secret: Secret, log: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            secret,
            cache_override: None,
            connector: Arc::new(WalletSynchronizer::new()),
            provider_factory: Arc::new(HttpProviderFactory),
            log,
        }
    }

    pub fn with_cache_override(mut self, path: Option<PathBuf>) -> Self {
        self.cache_override = path;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn WalletConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.provider_factory = factory;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache_for(&self, family: CacheFamily) -> StateCachePersister {
        StateCachePersister::resolve(
            &self.config.state_dir,
            &self.secret,
            self.config.network,
            family,
            self.cache_override.as_deref(),
        )
    }

    /// Runs `workflow` to completion or first failure. Everything acquired is
    /// released in reverse order either way; release failures are logged and
    /// never change the result.
    pub async fn run<W: Workflow>(&self, workflow: &W) -> Result<WorkflowReport<W::Output>, Error> {
        let mut stage = WorkflowStage::Init;
        let mut scope = ResourceScope::new(self.log.clone());
        let cache = self.cache_for(workflow.family());

        let result = self.drive(workflow, &cache, &mut scope, &mut stage).await;
        let release_failures = scope.release_all().await;

        match result {
            Ok(output) => {
                self.log
                    .info(&format!("{} finished ({stage})", workflow.name()));
                Ok(WorkflowReport {
                    output,
                    cache_file: cache.path().to_path_buf(),
                    release_failures,
                })
            }
            Err(e) => {
                self.log.error(&format!(
                    "{} failed after reaching {stage} [{}]: {e}",
                    workflow.name(),
                    e.kind()
                ));
                self.advance(&mut stage, WorkflowStage::Failed);
                Err(e)
            }
        }
    }

    async fn drive<W: Workflow>(
        &self,
        workflow: &W,
        cache: &StateCachePersister,
        scope: &mut ResourceScope,
        stage: &mut WorkflowStage,
    ) -> Result<W::Output, Error> {
        self.log.info(&format!(
            "Starting {} on {} (node {}, indexer {}, proof server {})",
            workflow.name(),
            self.config.network,
            self.config.node_url,
            self.config.indexer_url,
            self.config.proof_server_url
        ));
        self.advance(stage, WorkflowStage::ConfigResolved);

        let wallet = self
            .connector
            .connect(&self.config, &self.secret, cache, self.log.clone())
            .await?;
        scope.acquire(wallet.clone());
        self.advance(stage, WorkflowStage::WalletReady);

        let providers = self
            .provider_factory
            .configure(&wallet, &self.config, self.log.clone())?;
        scope.acquire(providers.clone());
        self.advance(stage, WorkflowStage::ProvidersReady);

        let env = WorkflowEnv {
            config: self.config.clone(),
            wallet: wallet.clone(),
            providers,
            log: self.log.clone(),
        };

        let session = Arc::new(workflow.open_session(&env).await?);
        scope.acquire(session.clone());
        self.advance(stage, WorkflowStage::SessionReady);

        let output = workflow.operate(&env, &session).await?;
        self.advance(stage, WorkflowStage::OperationComplete);

        cache.save(&wallet.serialize_state()?)?;
        self.log
            .debug(&format!("Wallet state saved to {}", cache.path().display()));
        self.advance(stage, WorkflowStage::StateSaved);

        Ok(output)
    }

    fn advance(&self, stage: &mut WorkflowStage, next: WorkflowStage) {
        self.log.debug(&format!("stage {stage} -> {next}"));
        *stage = next;
    }
}
