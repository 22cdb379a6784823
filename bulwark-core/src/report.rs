//! Run report: the three facts handed to downstream tooling (port, user,
//! firewall/ban status) plus what the run touched.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bulwark_workflow::{Outcome, RunProgress};
use serde::Serialize;

use crate::errors::Result;

pub const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub report_version: u32,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub ssh_port: Option<u16>,
    pub username: Option<String>,
    pub ssh_service: Option<String>,
    pub firewall_enabled: bool,
    pub https_allowed: Option<bool>,
    pub ban_daemon_enabled: bool,
    pub changed_files: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    pub progress: RunProgress,
}

pub fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            report_version: REPORT_VERSION,
            started_at: now_rfc3339(),
            ended_at: None,
            ssh_port: None,
            username: None,
            ssh_service: None,
            firewall_enabled: false,
            https_allowed: None,
            ban_daemon_enabled: false,
            changed_files: Vec::new(),
            backups: Vec::new(),
            progress: RunProgress::new(),
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(now_rfc3339());
    }

    pub fn succeeded(&self) -> bool {
        self.progress.is_done()
    }

    /// Human-readable lines for the final console summary.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.progress.outcome {
            Outcome::Done => lines.push("Hardening complete.".to_string()),
            Outcome::Aborted { stage, reason } => {
                lines.push(format!("Hardening aborted at '{}': {}", stage, reason))
            }
            Outcome::Pending => lines.push("Hardening did not finish.".to_string()),
        }
        if let Some(user) = &self.username {
            lines.push(format!("Admin user:      {}", user));
        }
        if let Some(port) = self.ssh_port {
            lines.push(format!("SSH port:        {}", port));
        }
        lines.push(format!(
            "Firewall:        {}",
            if self.firewall_enabled { "enabled" } else { "not configured" }
        ));
        lines.push(format!(
            "Ban daemon:      {}",
            if self.ban_daemon_enabled { "enabled" } else { "not configured" }
        ));
        if !self.backups.is_empty() {
            lines.push(format!("Backups written: {}", self.backups.len()));
        }
        if let (Some(user), Some(port), true) = (&self.username, self.ssh_port, self.succeeded()) {
            lines.push(format!("Connect with:    ssh -p {} {}@<host>", port, user));
        }
        lines
    }

    /// Atomic JSON write (temp file + rename).
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create report directory {}", parent.display()))?;
        }
        let payload = serde_json::to_string_pretty(self).context("failed to serialize run report")?;
        let tmp_path = path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(payload.as_bytes())
            .context("failed to write run report")?;
        file.sync_all().context("failed to flush run report")?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to move run report into {}", path.display()))?;
        Ok(())
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
