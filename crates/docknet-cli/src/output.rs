//! Result rendering and confirmation prompts.
//!
//! With `--json` every command prints exactly one envelope on stdout.
//! Otherwise success lines go to stdout and errors to stderr.

use std::io::{self, BufRead, Write};

use docknet_control::{
    ControlError, NetworkInfo, OperationResult, OutcomeStatus, PruneReport, Report,
};
use serde_json::{json, Value};
use tracing::warn;

/// Exit code for a declined confirmation.
pub const CANCELLED_CODE: i32 = 1;

/// An operation result plus the lines shown in text mode.
#[derive(Debug)]
pub struct Rendered {
    pub result: OperationResult,
    pub lines: Vec<String>,
}

impl Rendered {
    pub fn new(result: OperationResult, lines: Vec<String>) -> Self {
        Self { result, lines }
    }

    pub fn report<R: Report>(action: &str, report: &R, lines: Vec<String>) -> Self {
        Self::new(OperationResult::from_report(action, report), lines)
    }

    pub fn error(action: &str, err: &ControlError) -> Self {
        Self::new(OperationResult::from_error(action, err), Vec::new())
    }

    pub fn cancelled(action: &str, data: Value) -> Self {
        Self::new(
            OperationResult::failure(action, "cancelled", data, CANCELLED_CODE),
            vec!["Cancelled.".to_string()],
        )
    }

    pub fn code(&self) -> i32 {
        self.result.code
    }
}

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    json: bool,
    quiet: bool,
    assume_yes: bool,
}

impl OutputOptions {
    pub const fn new(json: bool, quiet: bool, assume_yes: bool) -> Self {
        Self {
            json,
            quiet,
            assume_yes,
        }
    }

    /// Print a rendered result.
    pub fn emit(&self, rendered: &Rendered) -> anyhow::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();

        if self.json {
            serde_json::to_writer(&mut out, &rendered.result)?;
            writeln!(out)?;
            return Ok(());
        }

        let failed = !rendered.result.is_ok();
        if failed && rendered.result.error.as_deref() != Some("cancelled") {
            if let Some(error) = &rendered.result.error {
                eprintln!("Error: {error}");
            }
        }
        if !self.quiet || failed {
            for line in &rendered.lines {
                writeln!(out, "{line}")?;
            }
        }
        Ok(())
    }

    /// Ask the operator to confirm a destructive step.
    ///
    /// Always true with `--yes` or `--json`. An unreadable answer declines.
    pub fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes || self.json {
            return true;
        }

        print!("{prompt} [y/N] ");
        let mut answer = String::new();
        let read = io::stdout()
            .flush()
            .and_then(|()| io::stdin().lock().read_line(&mut answer));
        match read {
            Ok(_) => is_affirmative(&answer),
            Err(e) => {
                warn!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

/// Accepted confirmation answers.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    )
}

// ============================================================================
// Command-specific shapes
// ============================================================================

pub fn info_lines(info: &NetworkInfo) -> Vec<String> {
    let mut lines = vec![
        format!("Network: {}", info.name),
        format!("  • ID: {}", info.short_id()),
        format!("  • Driver: {}", info.driver),
        format!("  • Subnet(s): {}", join_or_dash(&info.subnets)),
    ];
    if info.containers.is_empty() {
        lines.push("  • Connected containers: (none)".to_string());
    } else {
        lines.push("  • Connected containers:".to_string());
        for c in &info.containers {
            lines.push(format!(
                "      - {} (IP: {})",
                c.name,
                c.ipv4.as_deref().unwrap_or("-")
            ));
        }
    }
    lines
}

pub fn info_data(info: &NetworkInfo) -> Value {
    json!({ "network": info })
}

/// Envelope for a finished prune.
pub fn prune_result(report: &PruneReport) -> OperationResult {
    match report.status() {
        OutcomeStatus::PartialFailure | OutcomeStatus::Error => OperationResult {
            action: "prune".to_string(),
            status: OutcomeStatus::PartialFailure,
            code: 1,
            data: Some(json!({ "attempted": report.attempted() })),
            error: Some("partial failure".to_string()),
        },
        OutcomeStatus::Success | OutcomeStatus::Noop => OperationResult::success(
            "prune",
            json!({ "pruned": report.pruned.len(), "items": report.pruned }),
        ),
    }
}

pub fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
