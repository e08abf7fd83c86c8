pub(crate) mod command;

pub use command::{ArgsError, Cli, Commands};
