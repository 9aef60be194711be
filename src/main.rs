use anyhow::Result;
use clap::{Parser, Subcommand};
use nacosctl::cluster::{
    CreateOptions, DatasourceMode, ExternalDatabase, JoinOptions, LeaveOptions, Orchestrator,
    StandaloneOptions,
};
use nacosctl::config::ToolConfig;
use nacosctl::node::lifecycle::READY_TIMEOUT_SECS;
use nacosctl::node::ServerVersion;
use std::path::PathBuf;
use tracing_subscriber::{self, filter::LevelFilter, EnvFilter};

/// nacosctl - local Nacos server orchestration
///
/// Quick start:
///   nacosctl standalone                  # one instance on port 8848
///   nacosctl cluster create demo -n 3    # three-node cluster
///   nacosctl cluster clean demo          # stop it and remove its files
#[derive(Parser)]
#[command(name = "nacosctl")]
#[command(author = "Jerry")]
#[command(version)]
#[command(about = "Download, configure and run local Nacos servers", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that holds instances and clusters
    #[arg(long)]
    dir: Option<PathBuf>,

    /// IP the servers bind and advertise
    #[arg(long)]
    ip: Option<String>,

    /// Print summaries as JSON instead of a report
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single standalone server
    Standalone {
        /// Server version, e.g. 3.0.2
        #[arg(value_name = "VERSION")]
        version: Option<String>,

        /// Main port to request
        #[arg(short, long)]
        port: Option<u16>,

        /// Treat the requested port as fixed; fail instead of sliding
        /// to a free one
        #[arg(long)]
        advanced: bool,

        /// Reclaim the port when one of our own servers holds it
        #[arg(long)]
        kill: bool,

        /// Provision only, do not start the server
        #[arg(long)]
        no_start: bool,

        /// Leave the server running instead of watching it
        #[arg(short, long)]
        detach: bool,

        /// Seconds to wait for the server to answer its health check
        #[arg(long, value_name = "SECS", default_value_t = READY_TIMEOUT_SECS)]
        ready_timeout: u64,
    },

    /// Cluster management commands
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
}

#[derive(Subcommand)]
enum ClusterAction {
    /// Create a cluster: ports, node directories, membership, startup
    Create {
        /// Cluster name, also its directory name
        id: String,

        /// Server version, e.g. 3.0.2
        #[arg(value_name = "VERSION")]
        version: Option<String>,

        /// Number of nodes
        #[arg(short, long)]
        nodes: Option<u32>,

        /// Main port of the first node; later nodes step by ten
        #[arg(short, long)]
        port: Option<u16>,

        /// Tear an existing cluster of the same name down first
        #[arg(long)]
        clean: bool,

        /// Provision only, do not start the nodes
        #[arg(long)]
        no_start: bool,

        /// Leave the nodes running instead of watching them
        #[arg(short, long)]
        detach: bool,

        /// JDBC url of an external MySQL database
        #[arg(long, value_name = "URL")]
        db_url: Option<String>,

        /// User for the external database
        #[arg(long, value_name = "USER")]
        db_user: Option<String>,

        /// Password for the external database
        #[arg(long, value_name = "PASSWORD")]
        db_password: Option<String>,

        /// Seconds to wait for each node to answer its health check
        #[arg(long, value_name = "SECS", default_value_t = READY_TIMEOUT_SECS)]
        ready_timeout: u64,
    },

    /// Add one node to an existing cluster
    Join {
        /// Cluster name
        id: String,

        /// Port to start the search for the new node's ports from
        #[arg(short, long)]
        port: Option<u16>,

        /// Provision only, do not start the node
        #[arg(long)]
        no_start: bool,

        /// Leave the node running instead of watching it
        #[arg(short, long)]
        detach: bool,

        /// Seconds to wait for the node to answer its health check
        #[arg(long, value_name = "SECS", default_value_t = READY_TIMEOUT_SECS)]
        ready_timeout: u64,
    },

    /// Remove one node from a cluster
    Leave {
        /// Cluster name
        id: String,

        /// Index of the node to remove
        index: u32,
    },

    /// Stop a cluster's processes and delete its directory
    Clean {
        /// Cluster name
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse();
    let mut config = ToolConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.dir {
        config.root = dir;
    }
    if let Some(ip) = cli.ip {
        config.ip = ip;
    }
    if cli.json {
        config.json = true;
    }

    init_logging(&config.log_level);

    let default_version = config.version.clone();
    let default_port = config.base_port;
    let default_nodes = config.nodes;
    let orchestrator = Orchestrator::new(config);

    match cli.command {
        Commands::Standalone {
            version,
            port,
            advanced,
            kill,
            no_start,
            detach,
            ready_timeout,
        } => {
            let version = ServerVersion::parse(version.as_deref().unwrap_or(&default_version))?;
            let opts = StandaloneOptions {
                version,
                port: port.unwrap_or(default_port),
                advanced,
                allow_kill: kill,
                auto_start: !no_start,
                detach,
                ready_timeout_secs: ready_timeout,
            };
            orchestrator.run_standalone(&opts).await?;
        }
        Commands::Cluster { action } => match action {
            ClusterAction::Create {
                id,
                version,
                nodes,
                port,
                clean,
                no_start,
                detach,
                db_url,
                db_user,
                db_password,
                ready_timeout,
            } => {
                let version = ServerVersion::parse(version.as_deref().unwrap_or(&default_version))?;
                let opts = CreateOptions {
                    cluster_id: id,
                    version,
                    node_count: nodes.unwrap_or(default_nodes),
                    base_port: port.unwrap_or(default_port),
                    datasource: datasource_from_args(db_url, db_user, db_password)?,
                    clean,
                    auto_start: !no_start,
                    detach,
                    ready_timeout_secs: ready_timeout,
                };
                orchestrator.create_cluster(&opts).await?;
            }
            ClusterAction::Join {
                id,
                port,
                no_start,
                detach,
                ready_timeout,
            } => {
                let opts = JoinOptions {
                    cluster_id: id,
                    base_port: port.unwrap_or(default_port),
                    auto_start: !no_start,
                    detach,
                    ready_timeout_secs: ready_timeout,
                };
                orchestrator.join_cluster(&opts).await?;
            }
            ClusterAction::Leave { id, index } => {
                let opts = LeaveOptions {
                    cluster_id: id,
                    index,
                };
                orchestrator.leave_cluster(&opts).await?;
            }
            ClusterAction::Clean { id } => {
                orchestrator.clean_cluster(&id).await?;
            }
        },
    }

    Ok(())
}

fn init_logging(level: &str) {
    let level_filter = level.to_lowercase().parse::<LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Warning: Invalid log level '{level}', using 'info'");
        LevelFilter::INFO
    });
    let filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
}

fn datasource_from_args(
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
) -> Result<DatasourceMode> {
    match (url, user, password) {
        (None, None, None) => Ok(DatasourceMode::Embedded),
        (Some(url), Some(user), Some(password)) => Ok(DatasourceMode::External(ExternalDatabase {
            url,
            user,
            password,
        })),
        _ => anyhow::bail!("--db-url, --db-user and --db-password must be given together"),
    }
}
