//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or a real sshd.
//! Command replies can be scripted per program (and optional argument prefix).

use super::{HostInfoOps, ProcessOps};
use crate::{HalError, HalResult};
use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command {
        program: String,
        args: Vec<String>,
        timeout_secs: u64,
    },
    /// Stdin content is deliberately not recorded.
    CommandWithStdin { program: String, args: Vec<String> },
}

impl Operation {
    /// `program arg1 arg2 ...`, handy for assertions.
    pub fn command_line(&self) -> String {
        let (program, args) = match self {
            Operation::Command { program, args, .. } => (program, args),
            Operation::CommandWithStdin { program, args } => (program, args),
        };
        if args.is_empty() {
            program.clone()
        } else {
            format!("{} {}", program, args.join(" "))
        }
    }
}

/// Scripted reply for a faked command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandReply {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct ReplyRule {
    program: String,
    args_prefix: Vec<String>,
    reply: CommandReply,
}

#[derive(Debug, Clone)]
struct FakeHalState {
    operations: Vec<Operation>,
    rules: Vec<ReplyRule>,
    root: bool,
    users: HashSet<String>,
    groups: HashSet<String>,
    missing_executables: HashSet<String>,
}

impl Default for FakeHalState {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
            rules: Vec::new(),
            root: true,
            users: ["root".to_string()].into_iter().collect(),
            groups: ["root".to_string(), "sudo".to_string()]
                .into_iter()
                .collect(),
            missing_executables: HashSet::new(),
        }
    }
}

/// Fake HAL implementation that records operations without executing them.
///
/// Defaults: running as root, every executable present, accounts `root`,
/// groups `root` and `sudo`, every command succeeds with empty output.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Recorded operations rendered as command lines.
    pub fn command_lines(&self) -> Vec<String> {
        self.operations().iter().map(Operation::command_line).collect()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Clear all recorded operations.
    pub fn clear(&self) {
        self.state.lock().unwrap().operations.clear();
    }

    /// Script a reply for every invocation of `program`.
    pub fn on_command(&self, program: &str, reply: CommandReply) {
        self.on_command_args(program, &[], reply);
    }

    /// Script a reply for invocations of `program` whose arguments start with `args_prefix`.
    /// Later rules win over earlier ones.
    pub fn on_command_args(&self, program: &str, args_prefix: &[&str], reply: CommandReply) {
        self.state.lock().unwrap().rules.push(ReplyRule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            reply,
        });
    }

    pub fn set_root(&self, root: bool) {
        self.state.lock().unwrap().root = root;
    }

    pub fn add_user(&self, name: &str) {
        self.state.lock().unwrap().users.insert(name.to_string());
    }

    pub fn remove_group(&self, name: &str) {
        self.state.lock().unwrap().groups.remove(name);
    }

    pub fn remove_executable(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .missing_executables
            .insert(name.to_string());
    }

    fn record_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }

    fn reply_for(&self, program: &str, args: &[&str]) -> CommandReply {
        let state = self.state.lock().unwrap();
        state
            .rules
            .iter()
            .rev()
            .find(|rule| {
                rule.program == program
                    && rule.args_prefix.len() <= args.len()
                    && rule
                        .args_prefix
                        .iter()
                        .zip(args.iter())
                        .all(|(want, got)| want == got)
            })
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| CommandReply::success(""))
    }

    /// Model the account database side effect of a successful `useradd`.
    fn apply_side_effects(&self, program: &str, args: &[&str]) {
        if program == "useradd" {
            if let Some(name) = args.last() {
                self.add_user(name);
            }
        }
    }
}

impl ProcessOps for FakeHal {
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<Output> {
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: timeout.as_secs(),
        });
        log::info!("FAKE HAL: {} {}", program, args.join(" "));

        let reply = self.reply_for(program, args);
        if reply.code == 0 {
            self.apply_side_effects(program, args);
        }
        Ok(Output {
            status: ExitStatus::from_raw(reply.code << 8),
            stdout: reply.stdout.into_bytes(),
            stderr: reply.stderr.into_bytes(),
        })
    }

    fn command_status_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        _stdin: &[u8],
        _timeout: Duration,
    ) -> HalResult<()> {
        self.record_operation(Operation::CommandWithStdin {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        });
        log::info!("FAKE HAL: {} {} (stdin piped)", program, args.join(" "));

        let reply = self.reply_for(program, args);
        if reply.code != 0 {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: Some(reply.code),
                stderr: reply.stderr,
            });
        }
        Ok(())
    }
}

impl HostInfoOps for FakeHal {
    fn is_root(&self) -> bool {
        self.state.lock().unwrap().root
    }

    fn user_exists(&self, name: &str) -> HalResult<bool> {
        Ok(self.state.lock().unwrap().users.contains(name))
    }

    fn group_exists(&self, name: &str) -> HalResult<bool> {
        Ok(self.state.lock().unwrap().groups.contains(name))
    }

    fn find_executable(&self, program: &str) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        if state.missing_executables.contains(program) {
            return None;
        }
        Some(PathBuf::from("/usr/bin").join(program))
    }
}
