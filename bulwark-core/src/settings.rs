//! Run settings: every path and tunable the hardening pipeline touches.
//!
//! Defaults follow Debian/Ubuntu conventions. A TOML file (`--config`) may
//! override any subset of fields; CLI flags are applied on top by `cli`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 65535;
pub const HTTPS_PORT: u16 = 443;
pub const FALLBACK_PORT: u16 = 22222;
pub const PORT_ATTEMPTS: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub sshd_config: PathBuf,
    pub sshd_binary: String,
    /// Root scanned for drop-in fragments that re-enable password login.
    pub scan_root: PathBuf,
    pub home_root: PathBuf,
    pub admin_group: String,
    pub login_shell: String,
    pub log_file: PathBuf,
    pub report_path: Option<PathBuf>,
    pub packages: PackageSettings,
    pub ports: PortSettings,
    pub ban: BanSettings,
    pub timeouts: TimeoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sshd_config: PathBuf::from("/etc/ssh/sshd_config"),
            sshd_binary: "sshd".to_string(),
            scan_root: PathBuf::from("/etc/ssh"),
            home_root: PathBuf::from("/home"),
            admin_group: "sudo".to_string(),
            login_shell: "/bin/bash".to_string(),
            log_file: PathBuf::from("/var/log/bulwark/audit.log"),
            report_path: None,
            packages: PackageSettings::default(),
            ports: PortSettings::default(),
            ban: BanSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSettings {
    pub skip: bool,
    pub manager: String,
    pub refresh_args: Vec<String>,
    pub install_args: Vec<String>,
    pub names: Vec<String>,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            skip: false,
            manager: "apt-get".to_string(),
            refresh_args: vec!["update".to_string()],
            install_args: vec!["install".to_string(), "-y".to_string()],
            names: vec!["ufw".to_string(), "fail2ban".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortSettings {
    pub attempts: u32,
    pub fallback: u16,
    /// Fixed RNG seed; only useful for reproducible test runs.
    pub seed: Option<u64>,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            attempts: PORT_ATTEMPTS,
            fallback: FALLBACK_PORT,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BanSettings {
    pub service: String,
    pub client_binary: String,
    pub jail_path: PathBuf,
    pub ignoreip: String,
    pub bantime: String,
    pub findtime: String,
    pub maxretry: u32,
    pub logpath: String,
    pub backend: String,
}

impl Default for BanSettings {
    fn default() -> Self {
        Self {
            service: "fail2ban".to_string(),
            client_binary: "fail2ban-client".to_string(),
            jail_path: PathBuf::from("/etc/fail2ban/jail.local"),
            ignoreip: "127.0.0.1/8 ::1".to_string(),
            bantime: "1h".to_string(),
            findtime: "10m".to_string(),
            maxretry: 5,
            logpath: "/var/log/auth.log".to_string(),
            backend: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSettings {
    pub command_secs: u64,
    pub package_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: 120,
            package_secs: 60 * 60,
        }
    }
}

impl TimeoutSettings {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn packages(&self) -> Duration {
        Duration::from_secs(self.package_secs)
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).context("failed to parse settings TOML")?;
        crate::validation::validate_port_range(u32::from(settings.ports.fallback))
            .map_err(|msg| anyhow::anyhow!("ports.fallback: {}", msg))?;
        if !(1..=PORT_ATTEMPTS).contains(&settings.ports.attempts) {
            anyhow::bail!(
                "ports.attempts: must be between 1 and {}, got {}",
                PORT_ATTEMPTS,
                settings.ports.attempts
            );
        }
        Ok(settings)
    }

    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}
