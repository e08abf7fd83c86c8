use std::fmt;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::contract::ContractError;
use crate::deployment::RecordError;
use crate::providers::ProviderError;
use crate::seed::SeedError;
use crate::validation::ValidationError;
use crate::wallet::WalletError;

/// Coarse class of a failure, shown to the operator next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Validation,
    Wallet,
    Network,
    Contract,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::Wallet => "wallet",
            ErrorKind::Network => "network",
            ErrorKind::Contract => "contract",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Provider(_) => ErrorKind::Config,
            Error::Seed(SeedError::InvalidMnemonic(_)) => ErrorKind::Wallet,
            Error::Seed(_) | Error::Validation(_) => ErrorKind::Validation,
            Error::Wallet(WalletError::Unreachable(_)) => ErrorKind::Network,
            Error::Wallet(_) => ErrorKind::Wallet,
            Error::Contract(
                ContractError::GuardFailed { .. }
                | ContractError::NotFound(_)
                | ContractError::Decode(_),
            ) => ErrorKind::Contract,
            Error::Contract(ContractError::PrivateState(_)) => ErrorKind::Io,
            Error::Contract(_) => ErrorKind::Network,
            Error::Cache(_) | Error::Record(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
