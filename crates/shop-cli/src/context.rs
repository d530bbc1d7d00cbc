//! Host construction shared by every command

use std::path::Path;

use shop_core::{Host, HostConfig};

use crate::error::Result;

/// Open the host described by `config`, with the bundled
/// providers in its catalog.
pub fn open_host(config: HostConfig) -> Result<Host> {
    let host = Host::open(config, shop_bundled::catalog())?;
    Ok(host)
}

/// Open the host and make sure its registry schema exists, for commands that
/// write.
pub fn open_provisioned(config: HostConfig) -> Result<Host> {
    let mut host = open_host(config)?;
    let report = host.provision()?;
    if report.migrations > 0 {
        tracing::info!(migrations = report.migrations, "created extension registry");
    }
    Ok(host)
}

pub fn load_config(path: &Path) -> Result<HostConfig> {
    Ok(HostConfig::load(path)?)
}
