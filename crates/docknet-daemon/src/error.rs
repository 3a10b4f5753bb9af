//! Error types for the daemon crate.

use thiserror::Error;

/// Errors that can occur while talking to the network daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// The daemon binary could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was executed.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A daemon command exited unsuccessfully.
    #[error("command failed: {command}{}", stderr_suffix(.stderr))]
    CommandFailed {
        /// Rendered, individually quoted command line.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Daemon output could not be parsed.
    #[error("unexpected daemon output: {0}")]
    Parse(String),

    /// The daemon is not reachable.
    #[error("network daemon is unavailable")]
    Unavailable,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" ({trimmed})")
    }
}

impl DaemonError {
    /// The rendered command line, for errors raised by a daemon command.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { command, .. } => Some(command),
            _ => None,
        }
    }

    /// True if the daemon itself could not be reached (as opposed to a
    /// command being rejected).
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Unavailable)
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// A specialized Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_message_includes_stderr() {
        let err = DaemonError::CommandFailed {
            command: "docker network rm net-a".into(),
            code: Some(1),
            stderr: "Error: network has active endpoints\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "command failed: docker network rm net-a (Error: network has active endpoints)"
        );
        assert_eq!(err.command(), Some("docker network rm net-a"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn spawn_failure_is_unavailable() {
        let err = DaemonError::Spawn {
            program: "docker".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_unavailable());
        assert!(err.command().is_none());
    }
}
