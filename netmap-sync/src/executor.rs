//! Plan application against the live rule tables.
//!
//! Removals run first, with the append verb rewritten to the delete verb;
//! additions follow unmodified. Removal failures are warnings (the rule may
//! already be gone); addition failures are collected so every candidate is
//! attempted before the run reports one aggregate error.

use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rule_diff_core::{delete_command, RulePlan};
use thiserror::Error;

/// Default per-command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by one rule-command invocation.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty rule command")]
    Empty,
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("{command} exited with status {status}: {output}")]
    Failed {
        command: String,
        status: i32,
        output: String,
    },
}

/// Outcome of applying one plan.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub removed: usize,
    pub remove_failures: usize,
    pub added: usize,
    pub attempted_adds: usize,
    pub add_failures: Vec<(String, ExecError)>,
}

impl ApplyReport {
    /// True when every addition went through.
    pub fn success(&self) -> bool {
        self.add_failures.is_empty()
    }
}

/// Apply a reconciliation plan with one blocking command per rule.
pub fn apply_plan(plan: &RulePlan, timeout: Duration) -> ApplyReport {
    let mut report = ApplyReport::default();

    for rule in &plan.to_remove {
        let command = delete_command(&rule.raw);
        match run_rule_command(&command, timeout) {
            Ok(()) => report.removed += 1,
            Err(err) => {
                report.remove_failures += 1;
                warn!("failed to remove rule: {err}");
            }
        }
    }

    report.attempted_adds = plan.to_add.len();
    for rule in &plan.to_add {
        match run_rule_command(&rule.raw, timeout) {
            Ok(()) => report.added += 1,
            Err(err) => report.add_failures.push((rule.raw.clone(), err)),
        }
    }

    report
}

/// Run one whitespace-tokenized rule command, killing it at `timeout`.
pub fn run_rule_command(command: &str, timeout: Duration) -> Result<(), ExecError> {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let Some((program, args)) = parts.split_first() else {
        return Err(ExecError::Empty);
    };

    debug!("executing: {command}");
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            None => thread::sleep(Duration::from_millis(25)),
        }
    };

    if status.success() {
        return Ok(());
    }

    let output = child
        .wait_with_output()
        .map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        if combined.is_empty() {
            combined = stderr;
        } else {
            combined.push('\n');
            combined.push_str(&stderr);
        }
    }
    Err(ExecError::Failed {
        command: command.to_string(),
        status: status.code().unwrap_or(-1),
        output: combined,
    })
}

#[cfg(test)]
mod tests {
    use rule_diff_core::{Direction, Rule, RulePlan};

    use super::*;

    fn rule_with_raw(raw: &str) -> Rule {
        Rule {
            chain: "POSTROUTING".to_string(),
            direction: Direction::Outbound,
            interface: Some("pub1".to_string()),
            protocol: None,
            source: None,
            destination: None,
            target: "NETMAP".to_string(),
            target_arg: None,
            raw: raw.to_string(),
        }
    }

    #[test]
    fn successful_command_reports_ok() {
        run_rule_command("echo -A POSTROUTING", DEFAULT_TIMEOUT).expect("echo succeeds");
    }

    #[test]
    fn failing_command_reports_status() {
        let err = run_rule_command("false -A POSTROUTING", DEFAULT_TIMEOUT).unwrap_err();
        match err {
            ExecError::Failed { status, .. } => assert_eq!(status, 1),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            run_rule_command("   ", DEFAULT_TIMEOUT),
            Err(ExecError::Empty)
        ));
    }

    #[test]
    fn slow_command_is_killed_at_the_deadline() {
        let err = run_rule_command("sleep 5", Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }

    #[test]
    fn removal_failures_do_not_stop_additions() {
        let plan = RulePlan {
            to_remove: vec![rule_with_raw("false -A POSTROUTING stale")],
            to_add: vec![rule_with_raw("echo -A POSTROUTING fresh")],
            satisfied: vec![],
        };
        let report = apply_plan(&plan, DEFAULT_TIMEOUT);
        assert_eq!(report.remove_failures, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(report.added, 1);
        assert!(report.success());
    }

    #[test]
    fn addition_failures_are_collected_not_fatal_per_rule() {
        let plan = RulePlan {
            to_remove: vec![],
            to_add: vec![
                rule_with_raw("false -A POSTROUTING one"),
                rule_with_raw("echo -A POSTROUTING two"),
                rule_with_raw("false -A POSTROUTING three"),
            ],
            satisfied: vec![],
        };
        let report = apply_plan(&plan, DEFAULT_TIMEOUT);
        // Every candidate is attempted even after a failure.
        assert_eq!(report.attempted_adds, 3);
        assert_eq!(report.added, 1);
        assert_eq!(report.add_failures.len(), 2);
        assert!(!report.success());
    }
}
