//! Lifecycle orchestrator for docknet-managed networks.
//!
//! This crate decides what to do with a network (create, adopt, destroy,
//! rename, reload) and carries it out against the daemon, keeping an exact
//! account of every endpoint that could not be moved.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        docknet CLI                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     LifecycleService                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Ownership  │ │  Endpoint   │ │    Lifecycle        │    │
//! │  │  Resolver   │ │  Migration  │ │    State Machine    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Marker  │   │Inventory │   │  Daemon  │
//!        │  Store   │   │ (reads)  │   │ (writes) │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use docknet_control::{LifecycleService, NetworkLifecycle};
//! use docknet_core::{MachineId, NetworkSpec};
//! use docknet_daemon::{DaemonConfig, DockerCli};
//! use docknet_store::FileMarkerStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let daemon = Arc::new(DockerCli::new(DaemonConfig::from_env()));
//! let store = Arc::new(FileMarkerStore::from_env()?);
//! let service = LifecycleService::with_defaults(daemon, store);
//!
//! let machine = MachineId::parse("3f2a9c1e")?;
//! let report = service.ensure(&machine, &NetworkSpec::default()).await?;
//! println!("{}: {:?}", report.name, report.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Rename and Reload
//!
//! - Same name, or same subnet: disconnect all, remove, recreate, reconnect.
//! - New name with a new subnet: create the new network first, move each
//!   endpoint across, remove the old network last.
//!
//! See the [`lifecycle`] module for the state machine both paths follow.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod lifecycle;
pub mod migrate;
pub mod ownership;
pub mod service;
pub mod types;

pub use error::{ControlError, ErrorKind, Result};
pub use lifecycle::{NetworkState, StateTracker};
pub use migrate::{EndpointFailure, EndpointMigration};
pub use ownership::{Eligibility, OwnershipResolver};
pub use service::{LifecycleService, NetworkLifecycle};
pub use types::{
    ContainerInfo, ControlConfig, DestroyOutcome, DestroyReport, EnsureOutcome, EnsureReport,
    InitReport, NetworkInfo, OperationResult, OutcomeStatus, PruneReport, RenamePath, RenamePlan,
    RenameReport, Report,
};

// Re-export commonly used types from dependencies for convenience
pub use docknet_core::{MachineId, NetworkName, NetworkSpec};
pub use docknet_daemon::ManagedNetwork;
