//! Common error types for docknet.
//!
//! This module provides the umbrella error used by callers that parse user
//! input into core types in one place (names, CIDRs, specs).

use crate::cidr::CidrError;
use crate::ids::IdError;
use crate::spec::SpecError;
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while building or validating network input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A CIDR string could not be parsed.
    #[error("invalid CIDR: {0}")]
    InvalidCidr(#[from] CidrError),

    /// The network spec violates one of its invariants.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl CoreError {
    /// True if this error was caused by caller input rather than by state.
    ///
    /// Every variant currently is; the method exists so that higher layers
    /// can map core failures onto their own validation category without
    /// matching on variants.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidId(_) | Self::InvalidCidr(_) | Self::Spec(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_message() {
        let err: CoreError = IdError::InvalidNetworkName("-x".into()).into();
        assert_eq!(err.to_string(), "invalid identifier: invalid network name: \"-x\"");
        assert!(err.is_validation());

        let err: CoreError = SpecError::MissingParent.into();
        assert_eq!(err.to_string(), SpecError::MissingParent.to_string());
    }
}
