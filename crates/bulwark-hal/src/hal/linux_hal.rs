//! Linux HAL implementation using real processes and the host account database.

use super::{HostInfoOps, ProcessOps};
use crate::{HalError, HalResult};
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    match err.kind() {
        std::io::ErrorKind::NotFound => HalError::CommandNotFound(program.to_string()),
        std::io::ErrorKind::PermissionDenied => HalError::PermissionDenied,
        _ => HalError::Io(err),
    }
}

fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn collect_with_timeout(program: &str, mut child: Child, timeout: Duration) -> HalResult<Output> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

impl ProcessOps for LinuxHal {
    fn command_output(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<Output> {
        log::debug!("exec: {} {}", program, args.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| map_command_err(program, e))?;
        collect_with_timeout(program, child, timeout)
    }

    fn command_status_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
        timeout: Duration,
    ) -> HalResult<()> {
        log::debug!("exec (stdin piped): {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| map_command_err(program, e))?;

        // Dropping the handle closes the pipe so the child sees EOF.
        let written = match child.stdin.take() {
            Some(mut input) => input.write_all(stdin),
            None => Ok(()),
        };

        // Reap the child even when it closed stdin early.
        let output = collect_with_timeout(program, child, timeout)?;
        if !output.status.success() {
            return Err(output_failed(program, &output));
        }
        written.map_err(HalError::Io)
    }
}

impl HostInfoOps for LinuxHal {
    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn user_exists(&self, name: &str) -> HalResult<bool> {
        Ok(nix::unistd::User::from_name(name)?.is_some())
    }

    fn group_exists(&self, name: &str) -> HalResult<bool> {
        Ok(nix::unistd::Group::from_name(name)?.is_some())
    }

    fn find_executable(&self, program: &str) -> Option<PathBuf> {
        let path_env = std::env::var("PATH").unwrap_or_default();
        find_executable_in_path(program, &path_env)
    }
}

pub fn find_executable_in_path(binary: &str, path_env: &str) -> Option<PathBuf> {
    if binary.contains('/') {
        let candidate = Path::new(binary);
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    for dir in path_env.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
