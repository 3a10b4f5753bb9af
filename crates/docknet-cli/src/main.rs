//! docknet - manage Docker networks for development machines.
//!
//! This is the entry point for the `docknet` binary.

mod commands;
mod output;

use std::sync::Arc;

use anyhow::Context;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use docknet_control::{ControlConfig, LifecycleService};
use docknet_core::ids::DEFAULT_NETWORK_NAME;
use docknet_daemon::{DaemonConfig, DockerCli};
use docknet_store::FileMarkerStore;
use tracing_subscriber::EnvFilter;

use output::OutputOptions;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "DOCKNET_LOG";

/// docknet - create, inspect and clean up Docker networks for dev machines.
#[derive(Parser, Debug)]
#[command(name = "docknet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print one JSON result envelope on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Only print errors.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    /// Log every daemon command to stderr.
    #[arg(
        long,
        global = true,
        env = "DOCKNET_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    verbose: bool,

    /// Also remove containers attached to a destroyed network.
    #[arg(long, global = true)]
    with_containers: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a managed bridge network.
    Init {
        /// Network name.
        name: String,
        /// Subnet in CIDR form, e.g. 10.20.0.0/24.
        subnet: String,
    },

    /// Detach everything from a network and remove it.
    Destroy {
        /// Network name.
        name: String,
    },

    /// Show details of one network.
    Info {
        /// Network name.
        name: String,
    },

    /// List managed networks.
    List,

    /// Remove managed networks with no attached containers.
    Prune,

    /// Recreate a network, optionally with a new subnet, keeping its containers.
    Reload {
        /// Network name.
        name: String,
        /// New subnet; defaults to the current one.
        subnet: Option<String>,
    },

    /// Move a network and its containers to a new name.
    Rename {
        /// Current network name.
        old: String,
        /// New network name.
        new: String,
        /// Subnet for the new network; defaults to the current one.
        subnet: Option<String>,
    },

    /// Create or adopt the network for a machine.
    Up(UpArgs),

    /// Remove the network of a machine if the machine owns it.
    Down(DownArgs),

    /// Print the version.
    Version,
}

impl Command {
    const fn action(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Destroy { .. } => "destroy",
            Self::Info { .. } => "info",
            Self::List => "list",
            Self::Prune => "prune",
            Self::Reload { .. } => "reload",
            Self::Rename { .. } => "rename",
            Self::Up(_) => "up",
            Self::Down(_) => "down",
            Self::Version => "version",
        }
    }
}

/// Arguments for `up`.
#[derive(Args, Debug, Clone)]
struct UpArgs {
    /// Identity of the machine the network belongs to.
    #[arg(long, env = "DOCKNET_MACHINE_ID")]
    machine_id: String,

    /// Network name.
    #[arg(long, default_value = DEFAULT_NETWORK_NAME)]
    name: String,

    /// Network driver (bridge or macvlan).
    #[arg(long, default_value = "bridge")]
    driver: String,

    /// Subnet in CIDR form.
    #[arg(long)]
    subnet: Option<String>,

    /// Gateway address inside the subnet.
    #[arg(long)]
    gateway: Option<String>,

    /// Allocation range inside the subnet.
    #[arg(long)]
    ip_range: Option<String>,

    /// Host interface for macvlan networks.
    #[arg(long)]
    parent: Option<String>,

    /// Enable IPv6.
    #[arg(long)]
    ipv6: bool,

    /// Allow standalone containers to attach.
    #[arg(long)]
    attachable: bool,
}

/// Arguments for `down`.
#[derive(Args, Debug, Clone)]
struct DownArgs {
    /// Identity of the machine the network belongs to.
    #[arg(long, env = "DOCKNET_MACHINE_ID")]
    machine_id: String,

    /// Network name.
    #[arg(long, default_value = DEFAULT_NETWORK_NAME)]
    name: String,

    /// Leave the network in place.
    #[arg(long)]
    no_cleanup: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = OutputOptions::new(cli.json, cli.quiet, cli.yes);
    let rendered = match cli.command {
        Command::Version => commands::version(),
        command => {
            let service = build_service(cli.with_containers)?;
            commands::execute(&service, &output, command, cli.with_containers).await
        }
    };

    output.emit(&rendered)?;
    let code = rendered.code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        std::env::var(LOG_ENV)
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_service(
    with_containers: bool,
) -> anyhow::Result<LifecycleService<DockerCli, FileMarkerStore>> {
    let daemon_config = DaemonConfig::from_env();
    let mut config = ControlConfig::from_env().with_batch_size(daemon_config.batch_size);
    config.destroy_with_containers |= with_containers;

    let store = FileMarkerStore::from_env().context("failed to open the marker store")?;
    tracing::debug!(dir = %store.dir().display(), "Opened marker store");

    Ok(LifecycleService::new(
        Arc::new(DockerCli::new(daemon_config)),
        Arc::new(store),
        config,
    ))
}
