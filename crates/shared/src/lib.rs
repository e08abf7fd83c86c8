pub mod cache;
pub mod config;
pub mod contract;
pub mod deployment;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod patient;
pub mod providers;
pub mod seed;
pub mod simulator;
pub mod validation;
pub mod wallet;
pub mod workflow;

pub use error::{Error, ErrorKind, Result};
