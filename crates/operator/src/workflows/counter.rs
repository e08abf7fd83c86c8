use async_trait::async_trait;
use serde::Serialize;
use shared::cache::CacheFamily;
use shared::contract::{ContractAddress, ContractSession, CounterContract, Increment, TxReceipt};
use shared::workflow::{Workflow, WorkflowEnv};
use shared::Error;

use super::Deployed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CounterReport {
    pub(crate) contract_address: ContractAddress,
    #[serde(flatten)]
    pub(crate) receipt: TxReceipt,
    pub(crate) round: u64,
}

pub(crate) struct DeployCounter {
    pub(crate) initial_value: u64,
}

#[async_trait]
impl Workflow for DeployCounter {
    type Session = Deployed<CounterContract>;
    type Output = CounterReport;

    fn name(&self) -> &'static str {
        "deploy-counter"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Counter
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        let (session, receipt) = ContractSession::<CounterContract>::deploy(
            env.providers.clone(),
            &self.initial_value,
            &env.config.submission,
            env.log.clone(),
        )
        .await?;
        Ok(Deployed { session, receipt })
    }

    async fn operate(
        &self,
        env: &WorkflowEnv,
        deployed: &Self::Session,
    ) -> Result<CounterReport, Error> {
        let round = deployed.session.round().await?;
        env.log.info(&format!(
            "Counter deployed at {} with round {round}",
            deployed.session.address()
        ));
        Ok(CounterReport {
            contract_address: deployed.session.address().clone(),
            receipt: deployed.receipt.clone(),
            round,
        })
    }
}

pub(crate) struct IncrementCounter {
    pub(crate) address: ContractAddress,
}

#[async_trait]
impl Workflow for IncrementCounter {
    type Session = ContractSession<CounterContract>;
    type Output = CounterReport;

    fn name(&self) -> &'static str {
        "increment"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Counter
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        Ok(ContractSession::<CounterContract>::join(
            env.providers.clone(),
            self.address.clone(),
            &env.config.submission,
            env.log.clone(),
        )
        .await?)
    }

    async fn operate(
        &self,
        env: &WorkflowEnv,
        session: &Self::Session,
    ) -> Result<CounterReport, Error> {
        let before = session.round().await?;
        let receipt = session.invoke(Increment).await?;
        let round = session.round().await?;
        env.log
            .info(&format!("Counter at {} went from {before} to {round}", self.address));
        Ok(CounterReport {
            contract_address: self.address.clone(),
            receipt,
            round,
        })
    }
}
