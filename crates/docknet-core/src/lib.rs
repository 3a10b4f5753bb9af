//! Core types and utilities for docknet.
//!
//! This crate provides the foundational pieces used throughout the workspace:
//!
//! - **CIDR engine**: pure IPv4 address math (parse, normalize, overlap, containment)
//! - **Identifiers**: validated network names, machine identities and operation IDs
//! - **Network spec**: the desired-state descriptor and its validation rules
//! - **Labels**: the ownership labels attached to every managed network
//!
//! # Example
//!
//! ```
//! use docknet_core::cidr;
//!
//! assert_eq!(cidr::normalize("10.0.0.7/24").as_deref(), Some("10.0.0.0/24"));
//! assert!(cidr::overlap("10.0.0.0/24", "10.0.0.128/25"));
//! assert!(!cidr::is_aligned("10.0.0.1/24"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cidr;
pub mod error;
pub mod ids;
pub mod labels;
pub mod spec;

pub use cidr::{Cidr, CidrError};
pub use error::{CoreError, Result};
pub use ids::{IdError, MachineId, NetworkName, OperationId};
pub use spec::{Driver, NetworkSpec, SpecError};
