//! Listening-socket discovery.
//!
//! `ss` is preferred; `netstat` (net-tools) is the fallback on older hosts.

use std::time::Duration;

use anyhow::Context;
use bulwark_hal::{HostInfoOps, ProcessOps};

use crate::errors::Result;

/// One listening TCP socket and the processes holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub port: u16,
    pub processes: Vec<String>,
}

impl Listener {
    pub fn held_by(&self, process: &str) -> bool {
        self.processes.iter().any(|p| p == process)
    }
}

pub trait ListenerTool {
    fn name(&self) -> &'static str;

    /// Executable the tool runs.
    fn program(&self) -> &'static str;

    fn args(&self) -> &'static [&'static str];

    fn parse(&self, output: &str) -> Vec<Listener>;

    fn scan(&self, hal: &dyn ProcessOps, timeout: Duration) -> Result<Vec<Listener>> {
        let output = hal
            .command_output(self.program(), self.args(), timeout)
            .with_context(|| format!("failed to run {}", self.program()))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let listeners = self.parse(&String::from_utf8_lossy(&output.stdout));
        log::debug!("{} reported {} listening socket(s)", self.name(), listeners.len());
        Ok(listeners)
    }
}

/// `ss -H -ltnp`
pub struct SsTool;

impl ListenerTool for SsTool {
    fn name(&self) -> &'static str {
        "ss"
    }

    fn program(&self) -> &'static str {
        "ss"
    }

    fn args(&self) -> &'static [&'static str] {
        &["-H", "-ltnp"]
    }

    fn parse(&self, output: &str) -> Vec<Listener> {
        // State Recv-Q Send-Q Local:Port Peer:Port Process
        // LISTEN 0 128 0.0.0.0:22 0.0.0.0:* users:(("sshd",pid=812,fd=3))
        output
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.first() != Some(&"LISTEN") {
                    return None;
                }
                let port = parse_port(parts.get(3)?)?;
                let processes = line
                    .split_once("users:(")
                    .map(|(_, users)| ss_process_names(users))
                    .unwrap_or_default();
                Some(Listener { port, processes })
            })
            .collect()
    }
}

/// Names are the quoted fields of `("nginx",pid=901,fd=6),("nginx",pid=900,fd=6))`.
fn ss_process_names(users: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in users.split('"').skip(1).step_by(2) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// `netstat -ltnp`
pub struct NetstatTool;

impl ListenerTool for NetstatTool {
    fn name(&self) -> &'static str {
        "netstat"
    }

    fn program(&self) -> &'static str {
        "netstat"
    }

    fn args(&self) -> &'static [&'static str] {
        &["-ltnp"]
    }

    fn parse(&self, output: &str) -> Vec<Listener> {
        // Proto Recv-Q Send-Q Local Address Foreign Address State PID/Program name
        // tcp 0 0 0.0.0.0:22 0.0.0.0:* LISTEN 812/sshd: /usr/sbin
        output
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if !parts.first()?.starts_with("tcp") || parts.get(5) != Some(&"LISTEN") {
                    return None;
                }
                let port = parse_port(parts.get(3)?)?;
                let processes = parts
                    .get(6)
                    .and_then(|col| col.split_once('/'))
                    .map(|(_, program)| program.trim_end_matches(':').to_string())
                    .filter(|program| !program.is_empty())
                    .into_iter()
                    .collect();
                Some(Listener { port, processes })
            })
            .collect()
    }
}

/// Port of `0.0.0.0:22`, `[::]:22`, `*:22` or `127.0.0.53%lo:53`.
fn parse_port(local: &str) -> Option<u16> {
    let (_, port) = local.rsplit_once(':')?;
    port.parse().ok()
}

/// First available tool, `ss` before `netstat`.
pub fn pick_tool(hal: &dyn HostInfoOps) -> Option<Box<dyn ListenerTool>> {
    let candidates: Vec<Box<dyn ListenerTool>> = vec![Box::new(SsTool), Box::new(NetstatTool)];
    candidates
        .into_iter()
        .find(|tool| hal.find_executable(tool.program()).is_some())
}
