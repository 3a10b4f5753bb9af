//! Network daemon client and inventory reader for docknet.
//!
//! This crate provides the [`NetworkDaemon`] trait and its [`DockerCli`]
//! implementation, plus the [`Inventory`] reader layered on top of it:
//!
//! - Daemon commands built as argument vectors, never shell strings
//! - Typed snapshots of inspected networks ([`ObservedNetwork`])
//! - Batched, failure-tolerant lookups and subnet conflict detection
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────────────────────┐
//!  │        Lifecycle service      │
//!  └───────────────┬───────────────┘
//!                  │
//!        ┌─────────┴─────────┐
//!        ▼                   ▼
//!  ┌───────────┐      ┌─────────────┐
//!  │ Inventory │─────▶│NetworkDaemon│
//!  └───────────┘      └──────┬──────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     │  DockerCli  │──▶ CommandRunner ──▶ docker
//!                     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use docknet_daemon::{DaemonConfig, DockerCli, InspectFailurePolicy, Inventory, NetworkDaemon};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DaemonConfig::from_env();
//! let batch = config.batch_size;
//! let docker = DockerCli::new(config);
//!
//! if docker.is_available().await {
//!     let inventory = Inventory::new(&docker, batch);
//!     let busy = inventory
//!         .any_conflict("172.28.100.0/26", None, InspectFailurePolicy::Lenient)
//!         .await?;
//!     println!("subnet in use: {busy}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! For testing without a daemon, enable the `test-utils` feature and use the
//! in-memory mock:
//!
//! ```ignore
//! use docknet_daemon::{MockDaemon, NetworkDaemon};
//!
//! # async fn example() {
//! let daemon = MockDaemon::new();
//! daemon.add_network("net-a", Some("10.0.0.0/24"), &[]);
//! assert!(daemon.has_network("net-a"));
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod docker;
pub mod error;
pub mod inventory;
pub mod runner;
pub mod types;

pub use docker::{render_create, DockerCli, NetworkDaemon};
pub use error::{DaemonError, Result};
pub use inventory::{ConflictScan, InspectFailurePolicy, Inventory, ManagedNetwork};
pub use runner::{render_command, CommandOutput, CommandRunner, ProcessRunner};
pub use types::{
    AttachedEndpoint, CreateNetwork, DaemonConfig, IpamConfig, NetworkRow, ObservedNetwork,
    BATCH_SIZE_ENV, DOCKER_BIN_ENV, MAX_BATCH_SIZE,
};

#[cfg(any(test, feature = "test-utils"))]
pub use docker::mock::{DaemonCall, MockDaemon};
