use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use shared::cache::CacheFamily;
use shared::contract::{
    ContractAddress, ContractSession, RegisterPatient, RegistryContract, RegistryStats, TxReceipt,
};
use shared::deployment::DeploymentRecord;
use shared::patient::{ConditionHash, Gender};
use shared::workflow::{Workflow, WorkflowEnv};
use shared::Error;

use super::Deployed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistryDeployment {
    pub(crate) contract_address: ContractAddress,
    #[serde(flatten)]
    pub(crate) receipt: TxReceipt,
    pub(crate) deployer: String,
    pub(crate) initial_state: RegistryStats,
    pub(crate) deployment_file: PathBuf,
}

/// Deploys a registry and writes its deployment record. The record is part
/// of the operation: if it cannot be written the run fails and the wallet
/// cache is left alone.
pub(crate) struct DeployRegistry {
    pub(crate) deployment_file: PathBuf,
}

#[async_trait]
impl Workflow for DeployRegistry {
    type Session = Deployed<RegistryContract>;
    type Output = RegistryDeployment;

    fn name(&self) -> &'static str {
        "deploy-registry"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Registry
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        let (session, receipt) = ContractSession::<RegistryContract>::deploy(
            env.providers.clone(),
            &RegistryStats::default(),
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
    ) -> Result<RegistryDeployment, Error> {
        let initial_state = deployed.session.registration_stats().await?;
        let contract_address = deployed.session.address().clone();
        let deployer = env.wallet.address().to_string();

        DeploymentRecord::new(
            contract_address.clone(),
            deployed.receipt.transaction_id.clone(),
            env.config.network,
            deployer.clone(),
            initial_state,
        )
        .write(&self.deployment_file)?;
        env.log.info(&format!(
            "Deployment record for {contract_address} written to {}",
            self.deployment_file.display()
        ));

        Ok(RegistryDeployment {
            contract_address,
            receipt: deployed.receipt.clone(),
            deployer,
            initial_state,
            deployment_file: self.deployment_file.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistrationReport {
    pub(crate) contract_address: ContractAddress,
    #[serde(flatten)]
    pub(crate) receipt: TxReceipt,
    pub(crate) condition_hash: ConditionHash,
    pub(crate) stats: RegistryStats,
}

/// Registers one patient. The condition arrives already hashed; its text
/// never leaves the process.
pub(crate) struct RegisterPatientRecord {
    pub(crate) address: ContractAddress,
    pub(crate) age: u8,
    pub(crate) gender: Gender,
    pub(crate) condition_hash: ConditionHash,
}

#[async_trait]
impl Workflow for RegisterPatientRecord {
    type Session = ContractSession<RegistryContract>;
    type Output = RegistrationReport;

    fn name(&self) -> &'static str {
        "register-patient"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Registry
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        join_registry(env, &self.address).await
    }

    async fn operate(
        &self,
        env: &WorkflowEnv,
        session: &Self::Session,
    ) -> Result<RegistrationReport, Error> {
        env.log.info(&format!(
            "Registering patient (age {}, gender {}) at {}",
            self.age, self.gender, self.address
        ));
        let receipt = session
            .invoke(RegisterPatient {
                age: self.age,
                gender: self.gender.code(),
                condition_hash: self.condition_hash,
            })
            .await?;
        let stats = session.registration_stats().await?;
        env.log.info(&format!(
            "Registry now holds {} registrations",
            stats.registration_count
        ));
        Ok(RegistrationReport {
            contract_address: self.address.clone(),
            receipt,
            condition_hash: self.condition_hash,
            stats,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsReport {
    pub(crate) contract_address: ContractAddress,
    pub(crate) network: String,
    pub(crate) stats: RegistryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) recorded_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) registrations_since_deployment: Option<u64>,
}

pub(crate) struct VerifyStats {
    pub(crate) address: ContractAddress,
    pub(crate) record: Option<DeploymentRecord>,
}

#[async_trait]
impl Workflow for VerifyStats {
    type Session = ContractSession<RegistryContract>;
    type Output = StatsReport;

    fn name(&self) -> &'static str {
        "verify-stats"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Registry
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        join_registry(env, &self.address).await
    }

    async fn operate(
        &self,
        env: &WorkflowEnv,
        session: &Self::Session,
    ) -> Result<StatsReport, Error> {
        let network = env.config.network;
        if let Some(record) = &self.record {
            if !record.matches_network(network) {
                env.log.warn(&format!(
                    "Deployment record was made on {}, verifying on {network}",
                    record.network
                ));
            }
        }

        let stats = session.registration_stats().await?;
        let (total, male, female, other) = stats.as_tuple();
        env.log.info(&format!(
            "Registry {}: {total} registrations ({male} male, {female} female, {other} other)",
            self.address
        ));

        let record = self
            .record
            .as_ref()
            .filter(|record| record.contract_address == self.address);
        Ok(StatsReport {
            contract_address: self.address.clone(),
            network: network.to_string(),
            stats,
            recorded_network: self.record.as_ref().map(|record| record.network.clone()),
            registrations_since_deployment: record.map(|record| {
                total.saturating_sub(record.initial_state.registration_count)
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AgeRangeReport {
    pub(crate) contract_address: ContractAddress,
    pub(crate) age: u8,
    pub(crate) min_age: u8,
    pub(crate) max_age: u8,
    pub(crate) in_range: bool,
}

/// Checks range membership locally against a registry that must exist.
pub(crate) struct VerifyAgeRange {
    pub(crate) address: ContractAddress,
    pub(crate) age: u8,
    pub(crate) min_age: u8,
    pub(crate) max_age: u8,
}

#[async_trait]
impl Workflow for VerifyAgeRange {
    type Session = ContractSession<RegistryContract>;
    type Output = AgeRangeReport;

    fn name(&self) -> &'static str {
        "verify-age-range"
    }

    fn family(&self) -> CacheFamily {
        CacheFamily::Registry
    }

    async fn open_session(&self, env: &WorkflowEnv) -> Result<Self::Session, Error> {
        join_registry(env, &self.address).await
    }

    async fn operate(
        &self,
        env: &WorkflowEnv,
        _session: &Self::Session,
    ) -> Result<AgeRangeReport, Error> {
        let in_range = RegistryContract::verify_age_range(self.age, self.min_age, self.max_age);
        env.log.info(&format!(
            "Age {} is {}within [{}, {}]",
            self.age,
            if in_range { "" } else { "not " },
            self.min_age,
            self.max_age
        ));
        Ok(AgeRangeReport {
            contract_address: self.address.clone(),
            age: self.age,
            min_age: self.min_age,
            max_age: self.max_age,
            in_range,
        })
    }
}

async fn join_registry(
    env: &WorkflowEnv,
    address: &ContractAddress,
) -> Result<ContractSession<RegistryContract>, Error> {
    Ok(ContractSession::<RegistryContract>::join(
        env.providers.clone(),
        address.clone(),
        &env.config.submission,
        env.log.clone(),
    )
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::testing::{memory_env, memory_runner};
    use shared::config::Network;
    use shared::deployment::RecordError;
    use shared::contract::ContractError;
    use shared::logging::{LogLevel, MemorySink};
    use shared::patient::hash_condition;
    use shared::providers::memory::InMemoryLedger;

    async fn deploy(env: &WorkflowEnv, dir: &tempfile::TempDir) -> RegistryDeployment {
        let workflow = DeployRegistry {
            deployment_file: dir.path().join("deployment.json"),
        };
        let deployed = workflow.open_session(env).await.unwrap();
        workflow.operate(env, &deployed).await.unwrap()
    }

    fn registration(address: &ContractAddress, age: u8, gender: Gender) -> RegisterPatientRecord {
        RegisterPatientRecord {
            address: address.clone(),
            age,
            gender,
            condition_hash: hash_condition("hypertension"),
        }
    }

    #[tokio::test]
    async fn test_deploy_reports_zeroed_state_and_deployer() {
        let env = memory_env(&InMemoryLedger::new(), &MemorySink::new());
        let dir = tempfile::tempdir().unwrap();

        let deployment = deploy(&env, &dir).await;

        assert_eq!(deployment.initial_state, RegistryStats::default());
        assert_eq!(deployment.deployer, env.wallet.address());

        let record = DeploymentRecord::read(&deployment.deployment_file).unwrap();
        assert_eq!(record.contract_address, deployment.contract_address);
        assert_eq!(record.transaction_hash, deployment.receipt.transaction_id);
        assert_eq!(record.network, "standalone");
        assert_eq!(record.deployer, deployment.deployer);
    }

    #[tokio::test]
    async fn test_register_updates_stats() {
        let env = memory_env(&InMemoryLedger::new(), &MemorySink::new());
        let dir = tempfile::tempdir().unwrap();
        let deployment = deploy(&env, &dir).await;

        for (age, gender) in [(45, Gender::Female), (30, Gender::Male), (70, Gender::Female)] {
            let workflow = registration(&deployment.contract_address, age, gender);
            let session = workflow.open_session(&env).await.unwrap();
            workflow.operate(&env, &session).await.unwrap();
        }

        let verify = VerifyStats {
            address: deployment.contract_address.clone(),
            record: None,
        };
        let session = verify.open_session(&env).await.unwrap();
        let report = verify.operate(&env, &session).await.unwrap();
        assert_eq!(report.stats.as_tuple(), (3, 1, 2, 0));
        assert_eq!(report.recorded_network, None);
    }

    #[tokio::test]
    async fn test_verify_stats_warns_on_network_mismatch() {
        let sink = MemorySink::new();
        let env = memory_env(&InMemoryLedger::new(), &sink);
        let dir = tempfile::tempdir().unwrap();
        let deployment = deploy(&env, &dir).await;
        let record = DeploymentRecord::new(
            deployment.contract_address.clone(),
            deployment.receipt.transaction_id.clone(),
            Network::TestnetRemote,
            deployment.deployer.clone(),
            deployment.initial_state,
        );

        let verify = VerifyStats {
            address: deployment.contract_address.clone(),
            record: Some(record),
        };
        let session = verify.open_session(&env).await.unwrap();
        let report = verify.operate(&env, &session).await.unwrap();

        assert_eq!(report.recorded_network.as_deref(), Some("testnet-remote"));
        assert_eq!(report.network, "standalone");
        assert_eq!(report.registrations_since_deployment, Some(0));
        assert!(sink
            .messages_at(LogLevel::Warn)
            .iter()
            .any(|m| m.contains("testnet-remote")));
    }

    #[tokio::test]
    async fn test_age_range_is_local_and_inclusive() {
        let env = memory_env(&InMemoryLedger::new(), &MemorySink::new());
        let dir = tempfile::tempdir().unwrap();
        let deployment = deploy(&env, &dir).await;

        let check = |age, min_age, max_age| VerifyAgeRange {
            address: deployment.contract_address.clone(),
            age,
            min_age,
            max_age,
        };

        let inside = check(45, 18, 65);
        let session = inside.open_session(&env).await.unwrap();
        assert!(inside.operate(&env, &session).await.unwrap().in_range);

        let outside = check(45, 70, 80);
        assert!(!outside.operate(&env, &session).await.unwrap().in_range);
    }

    #[tokio::test]
    async fn test_age_range_requires_existing_registry() {
        let env = memory_env(&InMemoryLedger::new(), &MemorySink::new());
        let workflow = VerifyAgeRange {
            address: ContractAddress::parse(&"99".repeat(32)).unwrap(),
            age: 30,
            min_age: 18,
            max_age: 65,
        };

        assert!(matches!(
            workflow.open_session(&env).await,
            Err(Error::Contract(ContractError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_deploy_run_writes_record_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let runner = memory_runner(dir.path(), &InMemoryLedger::new(), &MemorySink::new());
        let workflow = DeployRegistry {
            deployment_file: dir.path().join("deployment.json"),
        };

        let report = runner.run(&workflow).await.unwrap();

        assert!(report.cache_file.exists());
        let record = DeploymentRecord::read(&workflow.deployment_file).unwrap();
        assert_eq!(record.contract_address, report.output.contract_address);
    }

    #[tokio::test]
    async fn test_unwritable_record_fails_without_cache_write() {
        let dir = tempfile::tempdir().unwrap();
        let runner = memory_runner(dir.path(), &InMemoryLedger::new(), &MemorySink::new());
        let workflow = DeployRegistry {
            deployment_file: dir.path().to_path_buf(),
        };
        let cache = runner.cache_for(CacheFamily::Registry);

        let err = runner.run(&workflow).await.unwrap_err();

        assert!(matches!(err, Error::Record(RecordError::Unwritable { .. })));
        assert!(!cache.path().exists());
    }
}
