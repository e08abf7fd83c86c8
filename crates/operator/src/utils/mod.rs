pub(crate) mod logging;

use std::path::PathBuf;

use directories::ProjectDirs;

/// Platform data directory for wallet caches and private state, or the
/// working directory when the platform has none.
pub(crate) fn default_state_dir() -> PathBuf {
    ProjectDirs::from("network", "health-ledger", "operator")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
