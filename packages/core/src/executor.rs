//! Privileged command execution.
//!
//! This module runs the mount utilities with escalated privileges via
//! `pkexec` (GUI) or `sudo` (TTY). Elevation is requested once per call;
//! authorization sessions are never reused across calls, so every privileged
//! operation carries its own consent prompt.
//!
//! Exit status is deliberately not treated as the source of truth for
//! mount/unmount outcomes. `mount`/`umount` exit semantics vary by filesystem
//! driver; the mount table (see [`crate::mount_table`]) decides whether an
//! operation actually took effect. This layer only reports errors it can
//! observe directly: the wrapper's reserved authorization codes and spawn
//! failures.

use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// pkexec reserved exit codes: 126 is dialog dismissal, 127 is authorization
/// failure. Anything else came from the wrapped command.
const PKEXEC_DISMISSED: i32 = 126;
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

/// Privilege escalation method for executing commands that require root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeEscalation {
    /// Execute directly without privilege escalation.
    None,
    /// Use `pkexec` for GUI-based privilege escalation (polkit).
    #[default]
    Pkexec,
    /// Use `sudo` for TTY-based privilege escalation.
    Sudo,
}

/// Executes external commands on behalf of the orchestrator.
///
/// The orchestrator only needs "run this program with these arguments and
/// tell me whether it ran"; tests substitute a recording stub.
pub trait CommandExecutor {
    /// Runs `program` with `args`, blocking until the process terminates.
    ///
    /// Returns `Ok(())` for any process that was started and ran to
    /// completion, regardless of its exit code. Errors are limited to
    /// elevation denial and launch failure.
    fn execute(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Executor that wraps each invocation with one-shot privilege escalation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegedExecutor {
    escalation: PrivilegeEscalation,
}

impl PrivilegedExecutor {
    pub fn new(escalation: PrivilegeEscalation) -> Self {
        Self { escalation }
    }

    /// Returns the configured privilege escalation method.
    pub fn escalation(&self) -> PrivilegeEscalation {
        self.escalation
    }

    /// Escalation actually applied for this process. A root process skips
    /// the wrapper entirely.
    fn effective_escalation(&self) -> PrivilegeEscalation {
        if nix::unistd::Uid::effective().is_root() {
            PrivilegeEscalation::None
        } else {
            self.escalation
        }
    }
}

impl CommandExecutor for PrivilegedExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<()> {
        let escalation = self.effective_escalation();
        let mut cmd = match escalation {
            PrivilegeEscalation::None => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            PrivilegeEscalation::Pkexec => wrap_command("pkexec", program, args),
            PrivilegeEscalation::Sudo => wrap_command("sudo", program, args),
        };

        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Error::ProcessLaunch {
                program: program.to_string(),
                source: e,
            })?;

        if escalation == PrivilegeEscalation::Pkexec {
            match status.code() {
                Some(PKEXEC_DISMISSED) | Some(PKEXEC_NOT_AUTHORIZED) => {
                    return Err(Error::ElevationDenied {
                        program: program.to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Builds a command wrapped with a privilege escalation wrapper.
fn wrap_command(wrapper: &str, program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(wrapper);
    cmd.arg(program);
    cmd.args(args);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_escalation_is_pkexec() {
        let executor = PrivilegedExecutor::default();
        assert_eq!(executor.escalation(), PrivilegeEscalation::Pkexec);
    }

    #[test]
    fn test_wrap_command_prepends_program() {
        let cmd = wrap_command(
            "sudo",
            "/sbin/mount",
            &["-t".to_string(), "msdos".to_string()],
        );
        assert_eq!(cmd.get_program(), "sudo");
        let argv: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
        assert_eq!(argv, vec!["/sbin/mount", "-t", "msdos"]);
    }

    #[test]
    fn test_escalation_serde_round_trip() {
        let json = serde_json::to_string(&PrivilegeEscalation::Sudo).unwrap();
        assert_eq!(json, r#""sudo""#);
        let back: PrivilegeEscalation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PrivilegeEscalation::Sudo);
    }
}
