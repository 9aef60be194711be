//! Node directory provisioning.
//!
//! A node directory is a full copy of the cached server package with
//! its `conf/application.properties` rewritten for the node's ports,
//! the cluster's shared auth material, and the datasource.

use super::{NodeDescriptor, ServerVersion};
use crate::cluster::{DatasourceMode, SharedSecrets};
use crate::error::Result;
use crate::package::PackageCache;
use crate::ports::PortSet;
use crate::properties;
use std::path::Path;
use tracing::info;

/// Server config file, relative to a node directory.
pub const APP_PROPERTIES: &str = "conf/application.properties";

/// Main-port key on server 3.x.
pub const KEY_MAIN_PORT: &str = "nacos.server.main.port";
/// Main-port key before 3.x.
pub const KEY_MAIN_PORT_LEGACY: &str = "server.port";
pub const KEY_CONSOLE_PORT: &str = "nacos.console.port";

const KEY_AUTH_ENABLED: &str = "nacos.core.auth.enabled";
const KEY_TOKEN_SECRET: &str = "nacos.core.auth.plugin.nacos.token.secret.key";
const KEY_IDENTITY_KEY: &str = "nacos.core.auth.server.identity.key";
const KEY_IDENTITY_VALUE: &str = "nacos.core.auth.server.identity.value";

const KEY_DB_PLATFORM: &str = "spring.datasource.platform";
const KEY_DB_NUM: &str = "db.num";
const KEY_DB_URL: &str = "db.url.0";
const KEY_DB_USER: &str = "db.user.0";
const KEY_DB_PASSWORD: &str = "db.password.0";

/// Installs and configures one cluster member.
pub async fn provision_node(
    cache: &PackageCache,
    cluster_dir: &Path,
    index: u32,
    version: &ServerVersion,
    ports: PortSet,
    secrets: &SharedSecrets,
    datasource: &DatasourceMode,
) -> Result<NodeDescriptor> {
    let node = NodeDescriptor::new(index, version, cluster_dir, ports);
    info!(node = %node.name, main = node.ports.main, "provisioning node");
    cache
        .install_into(version.as_str(), &node.directory)
        .await?;
    write_server_config(&node.directory, &node.ports, version.major(), secrets, datasource)?;
    Ok(node)
}

/// Installs and configures a standalone instance in `install_dir`.
///
/// An existing installation is reused; only its configuration is
/// rewritten.
pub async fn provision_standalone(
    cache: &PackageCache,
    install_dir: &Path,
    version: &ServerVersion,
    ports: &PortSet,
    secrets: &SharedSecrets,
) -> Result<()> {
    if !install_dir.join(crate::package::LAUNCH_SCRIPT).exists() {
        cache.install_into(version.as_str(), install_dir).await?;
    } else {
        info!(dir = %install_dir.display(), "reusing existing installation");
    }
    write_server_config(
        install_dir,
        ports,
        version.major(),
        secrets,
        &DatasourceMode::Embedded,
    )
}

/// Rewrites a node's `application.properties` for its assigned ports,
/// auth secrets, and datasource.
pub fn write_server_config(
    node_dir: &Path,
    ports: &PortSet,
    major: u32,
    secrets: &SharedSecrets,
    datasource: &DatasourceMode,
) -> Result<()> {
    let path = node_dir.join(APP_PROPERTIES);

    if major >= 3 {
        properties::set_property(&path, KEY_MAIN_PORT, &ports.main.to_string())?;
        if let Some(console) = ports.console {
            properties::set_property(&path, KEY_CONSOLE_PORT, &console.to_string())?;
        }
    } else {
        properties::set_property(&path, KEY_MAIN_PORT_LEGACY, &ports.main.to_string())?;
    }

    properties::set_property(&path, KEY_AUTH_ENABLED, "true")?;
    properties::set_property(&path, KEY_TOKEN_SECRET, &secrets.token_secret)?;
    properties::set_property(&path, KEY_IDENTITY_KEY, &secrets.identity_key)?;
    properties::set_property(&path, KEY_IDENTITY_VALUE, &secrets.identity_value)?;

    if let DatasourceMode::External(db) = datasource {
        properties::set_property(&path, KEY_DB_PLATFORM, "mysql")?;
        properties::set_property(&path, KEY_DB_NUM, "1")?;
        properties::set_property(&path, KEY_DB_URL, &db.url)?;
        properties::set_property(&path, KEY_DB_USER, &db.user)?;
        properties::set_property(&path, KEY_DB_PASSWORD, &db.password)?;
    }
    Ok(())
}

/// Ports recorded in a node's server config, when readable.
///
/// Both main-port keys are consulted, the one for `major` first, so a
/// directory written by an older layout still answers.
pub fn recorded_ports(node_dir: &Path, major: u32) -> Result<Option<PortSet>> {
    let path = node_dir.join(APP_PROPERTIES);
    let (primary, secondary) = if major >= 3 {
        (KEY_MAIN_PORT, KEY_MAIN_PORT_LEGACY)
    } else {
        (KEY_MAIN_PORT_LEGACY, KEY_MAIN_PORT)
    };

    let main = match properties::read_property(&path, primary)? {
        Some(value) => value.parse::<u16>().ok(),
        None => properties::read_property(&path, secondary)?.and_then(|v| v.parse().ok()),
    };
    let Some(main) = main else {
        return Ok(None);
    };
    let Some(mut set) = PortSet::derive(main) else {
        return Ok(None);
    };
    if let Some(console) = properties::read_property(&path, KEY_CONSOLE_PORT)?
        .and_then(|v| v.parse::<u16>().ok())
    {
        set = set.with_console(console);
    }
    Ok(Some(set))
}

/// Datasource recorded in a node's server config.
///
/// Anything short of a complete external-database block reads as
/// embedded, so a joining node falls back to the safe mode.
pub fn recorded_datasource(node_dir: &Path) -> Result<DatasourceMode> {
    let path = node_dir.join(APP_PROPERTIES);
    let platform = properties::read_property(&path, KEY_DB_PLATFORM)?;
    if platform.as_deref() != Some("mysql") {
        return Ok(DatasourceMode::Embedded);
    }
    let url = properties::read_property(&path, KEY_DB_URL)?;
    let user = properties::read_property(&path, KEY_DB_USER)?;
    let password = properties::read_property(&path, KEY_DB_PASSWORD)?;
    match (url, user, password) {
        (Some(url), Some(user), Some(password)) => Ok(DatasourceMode::External(
            crate::cluster::ExternalDatabase {
                url,
                user,
                password,
            },
        )),
        _ => Ok(DatasourceMode::Embedded),
    }
}
