use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::config::Config;
use shared::contract::ContractAddress;
use shared::deployment::{DeploymentRecord, RecordError};
use shared::logging::LogCrateSink;
use shared::seed::{normalize_seed, Secret};
use shared::validation::{
    require_contract_address, validate_age, validate_age_range, validate_condition,
    validate_gender, ValidationError,
};
use shared::workflow::{Workflow, WorkflowReport, WorkflowRunner};
use shared::Error;

use crate::utils::default_state_dir;
use crate::workflows::counter::{DeployCounter, IncrementCounter};
use crate::workflows::registry::{DeployRegistry, RegisterPatientRecord, VerifyAgeRange, VerifyStats};

const APP_VERSION: &str = match option_env!("OPERATOR_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Parser, Debug)]
#[command(author, version = APP_VERSION, about, long_about = None)]
pub struct Cli {
    /// Network to operate on: standalone, testnet-local or testnet-remote (alias testnet)
    #[arg(long, global = true, env = "NETWORK")]
    pub network: Option<String>,

    /// Wallet seed, as 64 hex characters or a BIP-39 mnemonic
    #[arg(long, global = true, env = "WALLET_SEED", hide_env_values = true)]
    pub seed: Option<String>,

    /// Wallet cache file (overrides the name derived from seed and network)
    #[arg(long, global = true, env = "WALLET_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Directory for wallet caches and private contract state
    #[arg(long, global = true, env = "STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seconds to wait for the wallet to sync and hold funds
    #[arg(long, global = true, env = "FUNDING_TIMEOUT_SECS", default_value_t = 600)]
    pub funding_timeout_secs: u64,

    /// Submission attempts per transaction, transient failures only
    #[arg(long, global = true, env = "MAX_SUBMIT_ATTEMPTS", default_value_t = 3)]
    pub max_submit_attempts: u32,

    #[command(subcommand)]
    pub command: Commands,
}

/// Why the command line could not be turned into a [`Cli`].
#[derive(Debug)]
pub enum ArgsError {
    /// Help or version output; clap prints it and exits.
    Display(clap::Error),
    /// Missing or malformed arguments, reported like any other validation
    /// failure.
    Invalid(Error),
}

impl ArgsError {
    /// Process status for this outcome.
    pub fn status(&self) -> u8 {
        match self {
            ArgsError::Display(e) => u8::try_from(e.exit_code()).unwrap_or(1),
            ArgsError::Invalid(_) => 1,
        }
    }
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::Display(e) => write!(f, "{e}"),
            ArgsError::Invalid(e) => write!(f, "error [{}]: {e}", e.kind().as_str()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a new counter contract
    DeployCounter {
        #[arg(long, env = "INITIAL_COUNTER", default_value_t = 0)]
        initial_value: u64,
    },

    /// Increment an existing counter contract
    Increment {
        #[arg(long, env = "CONTRACT_ADDRESS")]
        contract_address: Option<String>,
    },

    /// Deploy a new patient registry and write its deployment record
    DeployRegistry {
        #[arg(long, env = "DEPLOYMENT_FILE", default_value = "deployment.json")]
        deployment_file: PathBuf,
    },

    /// Register one patient; only a hash of the condition is submitted
    RegisterPatient {
        #[arg(long, env = "CONTRACT_ADDRESS")]
        contract_address: Option<String>,

        #[arg(long, env = "PATIENT_AGE", allow_negative_numbers = true)]
        age: i64,

        /// 0 = male, 1 = female, 2 = other
        #[arg(long, env = "PATIENT_GENDER", allow_negative_numbers = true)]
        gender: i64,

        #[arg(long, env = "PATIENT_CONDITION")]
        condition: String,
    },

    /// Print registry statistics, defaulting to the recorded deployment
    VerifyStats {
        #[arg(long, env = "CONTRACT_ADDRESS")]
        contract_address: Option<String>,

        #[arg(long, env = "DEPLOYMENT_FILE", default_value = "deployment.json")]
        deployment_file: PathBuf,
    },

    /// Check whether an age lies within an inclusive range
    VerifyAgeRange {
        #[arg(long, env = "CONTRACT_ADDRESS")]
        contract_address: Option<String>,

        #[arg(long, env = "PATIENT_AGE", allow_negative_numbers = true)]
        age: i64,

        #[arg(long, env = "MIN_AGE", allow_negative_numbers = true)]
        min_age: i64,

        #[arg(long, env = "MAX_AGE", allow_negative_numbers = true)]
        max_age: i64,
    },
}

/// A validated invocation. Nothing has been acquired yet.
pub(crate) struct Prepared {
    pub(crate) config: Config,
    pub(crate) secret: Secret,
    pub(crate) operation: Operation,
}

pub(crate) enum Operation {
    DeployCounter(DeployCounter),
    Increment(IncrementCounter),
    DeployRegistry(DeployRegistry),
    RegisterPatient(RegisterPatientRecord),
    VerifyStats(VerifyStats),
    VerifyAgeRange(VerifyAgeRange),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::DeployCounter(workflow) => workflow.name(),
            Operation::Increment(workflow) => workflow.name(),
            Operation::DeployRegistry(workflow) => workflow.name(),
            Operation::RegisterPatient(workflow) => workflow.name(),
            Operation::VerifyStats(workflow) => workflow.name(),
            Operation::VerifyAgeRange(workflow) => workflow.name(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a, T> {
    workflow: &'a str,
    result: &'a T,
    cache_file: &'a Path,
    release_failures: usize,
}

impl Cli {
    /// Parses `args` without exiting on bad input, so argument errors share
    /// the exit status of every other validation error.
    pub fn from_args<I, T>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args).map_err(|e| match e.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ArgsError::Display(e),
            _ => ArgsError::Invalid(
                ValidationError::InvalidArguments(describe_clap_error(&e)).into(),
            ),
        })
    }

    /// Resolves and validates every input, failing before any wallet,
    /// provider or contract is touched.
    pub(crate) fn prepare(&self) -> Result<Prepared, Error> {
        let state_dir = self.state_dir.clone().unwrap_or_else(default_state_dir);
        let config = Config::resolve(self.network.as_deref())?
            .with_state_dir(state_dir)
            .with_funding_timeout(Duration::from_secs(self.funding_timeout_secs))
            .with_max_submit_attempts(self.max_submit_attempts);
        let secret = normalize_seed(self.seed.as_deref())?;
        let operation = self.command.prepare()?;
        Ok(Prepared {
            config,
            secret,
            operation,
        })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let Prepared {
            config,
            secret,
            operation,
        } = self.prepare()?;

        let runner = WorkflowRunner::new(config, secret, LogCrateSink::shared(operation.name()))
            .with_cache_override(self.cache_file.clone());

        match &operation {
            Operation::DeployCounter(workflow) => execute(&runner, workflow).await,
            Operation::Increment(workflow) => execute(&runner, workflow).await,
            Operation::DeployRegistry(workflow) => execute(&runner, workflow).await,
            Operation::RegisterPatient(workflow) => execute(&runner, workflow).await,
            Operation::VerifyStats(workflow) => execute(&runner, workflow).await,
            Operation::VerifyAgeRange(workflow) => execute(&runner, workflow).await,
        }
    }
}

impl Commands {
    fn prepare(&self) -> Result<Operation, Error> {
        let operation = match self {
            Commands::DeployCounter { initial_value } => Operation::DeployCounter(DeployCounter {
                initial_value: *initial_value,
            }),
            Commands::Increment { contract_address } => Operation::Increment(IncrementCounter {
                address: require_contract_address(contract_address.as_deref())?,
            }),
            Commands::DeployRegistry { deployment_file } => {
                Operation::DeployRegistry(DeployRegistry {
                    deployment_file: deployment_file.clone(),
                })
            }
            Commands::RegisterPatient {
                contract_address,
                age,
                gender,
                condition,
            } => Operation::RegisterPatient(RegisterPatientRecord {
                address: require_contract_address(contract_address.as_deref())?,
                age: validate_age(*age)?,
                gender: validate_gender(*gender)?,
                condition_hash: validate_condition(condition)?,
            }),
            Commands::VerifyStats {
                contract_address,
                deployment_file,
            } => Operation::VerifyStats(prepare_verify_stats(
                contract_address.as_deref(),
                deployment_file,
            )?),
            Commands::VerifyAgeRange {
                contract_address,
                age,
                min_age,
                max_age,
            } => {
                let address = require_contract_address(contract_address.as_deref())?;
                let age = validate_age(*age)?;
                let (min_age, max_age) = validate_age_range(*min_age, *max_age)?;
                Operation::VerifyAgeRange(VerifyAgeRange {
                    address,
                    age,
                    min_age,
                    max_age,
                })
            }
        };
        Ok(operation)
    }
}

/// clap's message without its `error:` prefix, usage block or tips.
fn describe_clap_error(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let message = rendered.split("\n\n").next().unwrap_or_default();
    let message = message.strip_prefix("error: ").unwrap_or(message);
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The record is required unless an address is given explicitly; a record
/// that exists must still parse.
fn prepare_verify_stats(
    contract_address: Option<&str>,
    deployment_file: &Path,
) -> Result<VerifyStats, Error> {
    let explicit = contract_address
        .map(|raw| require_contract_address(Some(raw)))
        .transpose()?;

    let record = match DeploymentRecord::read(deployment_file) {
        Ok(record) => Some(record),
        Err(RecordError::Missing(_)) if explicit.is_some() => None,
        Err(e) => return Err(e.into()),
    };

    let address: ContractAddress = match (explicit, &record) {
        (Some(address), _) => address,
        (None, Some(record)) => record.contract_address.clone(),
        (None, None) => return Err(ValidationError::MissingContractAddress.into()),
    };
    Ok(VerifyStats { address, record })
}

async fn execute<W>(runner: &WorkflowRunner, workflow: &W) -> anyhow::Result<()>
where
    W: Workflow,
    W::Output: Serialize,
{
    let report = runner.run(workflow).await?;
    print_summary(workflow.name(), &report)
}

fn print_summary<T: Serialize>(workflow: &str, report: &WorkflowReport<T>) -> anyhow::Result<()> {
    let summary = Summary {
        workflow,
        result: &report.output,
        cache_file: &report.cache_file,
        release_failures: report.release_failures,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
