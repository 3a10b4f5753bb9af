//! Process execution for daemon commands.
//!
//! Commands are always passed as argument vectors and never through a shell.
//! [`render_command`] produces a display form for logs and error messages in
//! which each argument is quoted on its own.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{DaemonError, Result};

/// Captured result of one finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// True if the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output carrying `stdout`.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output carrying `stderr`.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Capability to run an external program and capture its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// A non-zero exit is not an error at this level; it is reported through
    /// [`CommandOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Spawn` if the program cannot be started.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(command = %render_command(program, args), "Running daemon command");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DaemonError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            debug!(code = ?result.code, stderr = %result.stderr.trim(), "Daemon command failed");
        }
        Ok(result)
    }
}

/// Render `program args...` for display, quoting each argument as needed.
#[must_use]
pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_arg(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,@%+".contains(&b));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn render_plain_arguments() {
        let rendered = render_command(
            "docker",
            &args(&["network", "create", "--subnet", "10.0.0.0/24", "net-a"]),
        );
        assert_eq!(rendered, "docker network create --subnet 10.0.0.0/24 net-a");
    }

    #[test]
    fn render_quotes_each_argument() {
        let rendered = render_command("docker", &args(&["rm", "-f", "my box", "it's", ""]));
        assert_eq!(rendered, r"docker rm -f 'my box' 'it'\''s' ''");
    }

    #[test]
    fn render_keeps_label_assignments_bare() {
        let rendered = render_command(
            "docker",
            &args(&["--label", "com.vagrant.plugin=docker_networks_manager"]),
        );
        assert_eq!(
            rendered,
            "docker --label com.vagrant.plugin=docker_networks_manager"
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = ProcessRunner
            .run("/nonexistent/docknet-test-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::Spawn { .. }));
    }
}
