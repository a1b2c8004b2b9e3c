use std::{
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::relay::RelayServerBuilder;

pub mod toml;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub relays: Vec<RelayServerBuilder>,
    /// Serves Prometheus metrics when set.
    pub monitor_addr: Option<SocketAddr>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file `{path}`: {source}")]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("{0}")]
    Parse(String),
}

pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        source,
        path: path.to_owned(),
    })?;
    parse_config(&path.to_string_lossy(), &src)
}

pub fn parse_config(file_path: &str, src: &str) -> Result<Config, ConfigError> {
    ::toml::from_str(src).map_err(|e| ConfigError::Parse(toml::human_toml_error(file_path, src, e)))
}
