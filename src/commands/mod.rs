pub mod config;
pub mod dashboard;
pub mod graph;
pub mod link;

use anyhow::{Context as AnyhowContext, Result};
use std::path::PathBuf;
use zabbix::Client;

use crate::Context;
use crate::config::{ServerConfig, ZlinkConfig};
use crate::paths;

/// Load the config selected by `--config`.
///
/// Commands validate only the sections they act on, so a bad graph never
/// stops a link apply.
pub fn load_config(ctx: &Context) -> Result<ZlinkConfig> {
    let path = paths::config_file(ctx.config.as_deref())?;
    ZlinkConfig::load(&path)
}

pub fn state_path() -> Result<PathBuf> {
    paths::state_file()
}

/// Connect and authenticate to the configured server
pub fn connect(server: &ServerConfig) -> Result<Client> {
    let client_config = server.client_config()?;
    Client::connect(&client_config)
        .with_context(|| format!("Could not connect to {}", client_config.endpoint()))
}
