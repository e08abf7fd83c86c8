use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::source::WalletSyncSource;
use super::state::{WalletSnapshot, WalletState};
use super::{coin_public_key, signer_from_secret, Wallet, WalletError};
use crate::cache::StateCachePersister;
use crate::config::{Config, FundingPolicy};
use crate::error::Error;
use crate::lifecycle::{Releasable, ReleaseError};
use crate::logging::LogSink;
use crate::providers::IndexerClient;
use crate::seed::Secret;

#[derive(Debug, Clone, Default)]
struct SyncStatus {
    state: WalletState,
    /// Set once the source has answered at least one poll.
    contacted: bool,
    last_error: Option<String>,
}

/// A wallet with a live background sync task.
///
/// Closing cancels the task and waits for it to finish; closing again is a
/// no-op.
pub struct WalletSession {
    signer: PrivateKeySigner,
    address: String,
    coin_public_key: String,
    status: watch::Receiver<SyncStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    log: Arc<dyn LogSink>,
}

#[cfg(test)]
impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Spawns the sync task; must be called inside a tokio runtime.
    pub fn start(
        secret: &Secret,
        source: Arc<dyn WalletSyncSource>,
        restored: Option<WalletState>,
        policy: &FundingPolicy,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, WalletError> {
        let signer = signer_from_secret(secret)?;
        let address = signer.address().to_string();
        let (status_tx, status_rx) = watch::channel(SyncStatus {
            state: restored.unwrap_or_default(),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(sync_loop(
            source,
            address.clone(),
            status_tx,
            cancel.clone(),
            policy.clone(),
            log.clone(),
        ));

        Ok(Self {
            signer,
            address,
            coin_public_key: coin_public_key(secret),
            status: status_rx,
            cancel,
            task: Mutex::new(Some(task)),
            log,
        })
    }

    /// Suspends until the source reports a synced wallet with a positive
    /// balance, the sync task stops, or `policy.timeout` elapses.
    pub async fn wait_until_funded(
        &self,
        policy: &FundingPolicy,
    ) -> Result<WalletState, WalletError> {
        let mut status = self.status.clone();
        let waited = timeout(policy.timeout, async {
            loop {
                {
                    let current = status.borrow_and_update();
                    if current.contacted && current.state.is_funded() {
                        return Ok(current.state);
                    }
                }
                if status.changed().await.is_err() {
                    let reason = status
                        .borrow()
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "sync task ended".to_string());
                    return Err(WalletError::SyncStopped(reason));
                }
            }
        })
        .await;

        match waited {
            Ok(outcome) => outcome,
            Err(_) => {
                let current = self.status.borrow();
                if current.contacted {
                    Err(WalletError::funding_timeout(policy.timeout, current.state))
                } else {
                    Err(WalletError::Unreachable(
                        current
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "no response from sync source".to_string()),
                    ))
                }
            }
        }
    }
}

async fn sync_loop(
    source: Arc<dyn WalletSyncSource>,
    address: String,
    status: watch::Sender<SyncStatus>,
    cancel: CancellationToken,
    policy: FundingPolicy,
    log: Arc<dyn LogSink>,
) {
    let mut backoff = policy.poll_interval;
    let mut reported_percent = None;
    let mut reported_unfunded = false;

    loop {
        let current = status.borrow().state;
        let polled = tokio::select! {
            _ = cancel.cancelled() => return,
            polled = source.poll(&address, &current) => polled,
        };

        let delay = match polled {
            Ok(state) => {
                let percent = state.progress_percent();
                if reported_percent != Some(percent) {
                    log.info(&format!(
                        "Wallet sync {percent}% ({}/{}), balance {}",
                        state.synced_height, state.network_height, state.balance
                    ));
                    reported_percent = Some(percent);
                }
                if state.is_synced() && state.balance == 0 && !reported_unfunded {
                    log.info(&format!("Wallet {address} has no funds yet, waiting for a deposit"));
                    reported_unfunded = true;
                }
                status.send_modify(|s| {
                    s.state = state;
                    s.contacted = true;
                    s.last_error = None;
                });
                backoff = policy.poll_interval;
                policy.poll_interval
            }
            Err(e) if e.is_transient() => {
                log.warn(&format!("Wallet sync poll failed, retrying in {backoff:?}: {e}"));
                status.send_modify(|s| s.last_error = Some(e.to_string()));
                let delay = backoff;
                backoff = backoff.saturating_mul(2).min(policy.max_backoff);
                delay
            }
            Err(e) => {
                log.error(&format!("Wallet sync stopped: {e}"));
                status.send_modify(|s| s.last_error = Some(e.to_string()));
                return;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

#[async_trait]
impl Releasable for WalletSession {
    fn resource_name(&self) -> &str {
        "wallet"
    }

    async fn release(&self) -> Result<(), ReleaseError> {
        self.cancel.cancel();
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        task.await
            .map_err(|e| ReleaseError::new(self.resource_name(), e))?;
        self.log.debug(&format!("Wallet {} closed", self.address));
        Ok(())
    }
}

impl Wallet for WalletSession {
    fn address(&self) -> &str {
        &self.address
    }

    fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    fn coin_public_key(&self) -> &str {
        &self.coin_public_key
    }

    fn state(&self) -> WalletState {
        self.status.borrow().state
    }

    fn serialize_state(&self) -> Result<String, WalletError> {
        serde_json::to_string(&WalletSnapshot::new(&self.address, self.state()))
            .map_err(|e| WalletError::Snapshot(e.to_string()))
    }
}

/// Produces a synchronized, funded wallet for a workflow.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(
        &self,
        config: &Config,
        secret: &Secret,
        cache: &StateCachePersister,
        log: Arc<dyn LogSink>,
    ) -> Result<Arc<dyn Wallet>, Error>;
}

/// Restores from the cache file, starts a [`WalletSession`] and waits for
/// funds. Without an explicit source it polls the configured indexer.
#[derive(Default, Clone)]
pub struct WalletSynchronizer {
    source: Option<Arc<dyn WalletSyncSource>>,
}

impl WalletSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: Arc<dyn WalletSyncSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn source_for(
        &self,
        config: &Config,
        log: &Arc<dyn LogSink>,
    ) -> Result<Arc<dyn WalletSyncSource>, Error> {
        if let Some(source) = &self.source {
            return Ok(source.clone());
        }
        let indexer = IndexerClient::new(config.indexer_url.clone(), log.clone())?;
        Ok(Arc::new(indexer))
    }

    pub async fn synchronize(
        &self,
        config: &Config,
        secret: &Secret,
        cache: &StateCachePersister,
        log: Arc<dyn LogSink>,
    ) -> Result<WalletSession, Error> {
        let address = signer_from_secret(secret)?.address().to_string();
        let restored = match cache.load()? {
            Some(blob) => match WalletSnapshot::decode(&blob, &address) {
                Some(state) => {
                    log.info(&format!(
                        "Restored wallet state from {} at height {}",
                        cache.path().display(),
                        state.synced_height
                    ));
                    Some(state)
                }
                None => {
                    log.warn(&format!(
                        "Ignoring unusable wallet cache {}, syncing from scratch",
                        cache.path().display()
                    ));
                    None
                }
            },
            None => {
                log.info(&format!(
                    "No wallet cache at {}, syncing from scratch",
                    cache.path().display()
                ));
                None
            }
        };

        let source = self.source_for(config, &log)?;
        let session = WalletSession::start(secret, source, restored, &config.funding, log.clone())?;
        log.info(&format!("Waiting for wallet {address} to sync and be funded"));

        match session.wait_until_funded(&config.funding).await {
            Ok(state) => {
                log.info(&format!(
                    "Wallet ready at height {} with balance {}",
                    state.synced_height, state.balance
                ));
                Ok(session)
            }
            Err(e) => {
                if let Err(release_err) = session.release().await {
                    log.warn(&format!("cleanup: {release_err}"));
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl WalletConnector for WalletSynchronizer {
    async fn connect(
        &self,
        config: &Config,
        secret: &Secret,
        cache: &StateCachePersister,
        log: Arc<dyn LogSink>,
    ) -> Result<Arc<dyn Wallet>, Error> {
        let session = self.synchronize(config, secret, cache, log).await?;
        Ok(Arc::new(session))
    }
}
