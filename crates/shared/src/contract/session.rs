use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::circuits::{
    CircuitCall, Contract, CounterContract, RegistryContract, RegistryPrivateState, RegistryStats,
};
use super::retry::submit_with_retry;
use super::transaction::{TransactionKind, TxReceipt, UnprovenTransaction};
use super::{ContractAddress, ContractError};
use crate::config::RetryPolicy;
use crate::lifecycle::Releasable;
use crate::logging::LogSink;
use crate::providers::ProviderBundle;

/// A handle on one deployed instance of `C`.
pub struct ContractSession<C: Contract> {
    address: ContractAddress,
    providers: ProviderBundle,
    policy: RetryPolicy,
    log: Arc<dyn LogSink>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Contract> ContractSession<C> {
    fn new(
        address: ContractAddress,
        providers: ProviderBundle,
        policy: &RetryPolicy,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            address,
            providers,
            policy: policy.clone(),
            log,
            _contract: PhantomData,
        }
    }

    /// Deploys a fresh instance and seeds this party's private state for it.
    pub async fn deploy(
        providers: ProviderBundle,
        args: &C::Args,
        policy: &RetryPolicy,
        log: Arc<dyn LogSink>,
    ) -> Result<(Self, TxReceipt), ContractError> {
        let address = ContractAddress::derive(
            C::NAME,
            &providers.coin_public_key,
            &ContractAddress::random_nonce(),
        );
        let ledger = C::initial_ledger(args);
        let unproven = UnprovenTransaction {
            kind: TransactionKind::Deploy,
            network_id: providers.network_id.clone(),
            contract: C::NAME.to_string(),
            contract_address: address.clone(),
            circuit: None,
            arguments: encode(args)?,
            next_state: encode(&ledger)?,
            coin_public_key: providers.coin_public_key.clone(),
        };

        log.info(&format!("Deploying {} at {address}", C::NAME));
        let session = Self::new(address, providers, policy, log);
        let receipt = session.prove_and_submit(unproven).await?;
        session
            .store_private_state(&C::initial_private_state())
            .await?;
        session.log.info(&format!(
            "Deployed {} at {} in block {}",
            C::NAME,
            session.address,
            receipt.block_height
        ));
        Ok((session, receipt))
    }

    /// Attaches to an existing instance. Fails with `NotFound` unless its
    /// ledger can be read and decoded.
    pub async fn join(
        providers: ProviderBundle,
        address: ContractAddress,
        policy: &RetryPolicy,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ContractError> {
        let session = Self::new(address, providers, policy, log);
        if let Err(e) = session.ledger_state().await {
            session
                .log
                .error(&format!("Cannot join {} at {}: {e}", C::NAME, session.address));
            return Err(ContractError::NotFound(session.address.clone()));
        }
        session
            .log
            .info(&format!("Joined {} at {}", C::NAME, session.address));
        Ok(session)
    }

    pub fn address(&self) -> &ContractAddress {
        &self.address
    }

    /// Current public ledger. Never mutates anything.
    pub async fn ledger_state(&self) -> Result<C::Ledger, ContractError> {
        let raw = self
            .providers
            .public_data
            .contract_state(&self.address)
            .await
            .map_err(|e| ContractError::Transport(e.to_string()))?
            .ok_or_else(|| ContractError::NotFound(self.address.clone()))?;
        decode(raw)
    }

    pub async fn private_state(&self) -> Result<C::PrivateState, ContractError> {
        let stored = self
            .providers
            .private_state
            .get(&self.address)
            .await
            .map_err(|e| ContractError::PrivateState(e.to_string()))?;
        match stored {
            Some(raw) => decode(raw),
            None => Ok(C::initial_private_state()),
        }
    }

    /// Runs `call` against the current ledger, proves and submits the
    /// transition, then records the new private state.
    ///
    /// Guard failures surface before anything is proven or sent.
    pub async fn invoke(&self, call: C::Call) -> Result<TxReceipt, ContractError> {
        let mut ledger = self.ledger_state().await?;
        let mut private_state = self.private_state().await?;
        C::apply(&mut ledger, &mut private_state, &call)?;

        let unproven = UnprovenTransaction {
            kind: TransactionKind::Call,
            network_id: self.providers.network_id.clone(),
            contract: C::NAME.to_string(),
            contract_address: self.address.clone(),
            circuit: Some(call.circuit_name().to_string()),
            arguments: encode(&call)?,
            next_state: encode(&ledger)?,
            coin_public_key: self.providers.coin_public_key.clone(),
        };
        let receipt = self.prove_and_submit(unproven).await?;
        self.store_private_state(&private_state).await?;
        Ok(receipt)
    }

    async fn prove_and_submit(
        &self,
        unproven: UnprovenTransaction,
    ) -> Result<TxReceipt, ContractError> {
        let label = unproven.label();
        self.log.debug(&format!("Proving {label}"));
        let proven = self
            .providers
            .proof
            .prove(unproven)
            .await
            .map_err(|e| ContractError::ProvingFailed(e.to_string()))?;
        submit_with_retry(&self.providers.submitter, &proven, &self.policy, &*self.log).await
    }

    async fn store_private_state(&self, state: &C::PrivateState) -> Result<(), ContractError> {
        self.providers
            .private_state
            .set(&self.address, encode(state)?)
            .await
            .map_err(|e| ContractError::PrivateState(e.to_string()))
    }
}

impl ContractSession<CounterContract> {
    pub async fn round(&self) -> Result<u64, ContractError> {
        Ok(self.ledger_state().await?.round)
    }
}

impl ContractSession<RegistryContract> {
    pub async fn registration_stats(&self) -> Result<RegistryStats, ContractError> {
        self.ledger_state().await
    }

    pub async fn registered_conditions(&self) -> Result<RegistryPrivateState, ContractError> {
        self.private_state().await
    }
}

impl<C: Contract> Releasable for ContractSession<C> {
    fn resource_name(&self) -> &str {
        "contract session"
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ContractError> {
    serde_json::to_value(value).map_err(|e| ContractError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, ContractError> {
    serde_json::from_value(raw).map_err(|e| ContractError::Decode(e.to_string()))
}
