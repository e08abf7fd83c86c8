mod cli;
mod utils;
mod workflows;

pub use cli::{ArgsError, Cli, Commands};
pub use utils::logging::setup_logging;
