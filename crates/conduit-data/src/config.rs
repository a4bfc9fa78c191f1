//! Loading [`NetworkConfig`] from `conduit.{ron,toml,json}`.

use std::path::{Path, PathBuf};

use conduit_core::config::NetworkConfig;
use tracing::debug;

use crate::loader::{DataLoadError, deserialize_file, find_data_file};

/// Base name of the config file.
pub const CONFIG_BASE_NAME: &str = "conduit";

/// The config file in `dir`, if there is exactly one.
pub fn find_config(dir: &Path) -> Result<Option<PathBuf>, DataLoadError> {
    find_data_file(dir, CONFIG_BASE_NAME)
}

/// Reads a config file. Missing fields keep their defaults.
pub fn load_config(path: &Path) -> Result<NetworkConfig, DataLoadError> {
    let config: NetworkConfig = deserialize_file(path)?;
    debug!(path = %path.display(), tick_rate = %config.tick_rate, "loaded network config");
    Ok(config)
}

/// Loads the config in `dir`, or the defaults when there is none.
pub fn load_config_dir(dir: &Path) -> Result<NetworkConfig, DataLoadError> {
    match find_config(dir)? {
        Some(path) => load_config(&path),
        None => Ok(NetworkConfig::default()),
    }
}
