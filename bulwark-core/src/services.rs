//! Service manager abstraction: systemd where present, SysV `service` otherwise.

use std::time::Duration;

use anyhow::Context;
use bulwark_hal::{HostInfoOps, SystemHal};

use crate::errors::{BulwarkError, Result};

/// Conventional unit names of the OpenSSH server, Debian first.
pub const SSH_UNITS: [&str; 2] = ["ssh", "sshd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    Systemd,
    SysV,
}

impl ServiceManager {
    pub fn detect<H: HostInfoOps + ?Sized>(hal: &H) -> Result<Self> {
        if hal.find_executable("systemctl").is_some() {
            Ok(ServiceManager::Systemd)
        } else if hal.find_executable("service").is_some() {
            Ok(ServiceManager::SysV)
        } else {
            Err(BulwarkError::NoServiceManager.into())
        }
    }

    /// Restart the SSH daemon under whichever unit name the host uses.
    pub fn restart_ssh<H: SystemHal>(&self, hal: &H, timeout: Duration) -> Result<String> {
        if *self == ServiceManager::Systemd {
            if let Some(unit) = known_ssh_unit(hal, timeout)? {
                hal.command_status("systemctl", &["restart", &unit], timeout)
                    .with_context(|| format!("failed to restart {}", unit))?;
                confirm_active(hal, &unit, timeout)?;
                log::info!("Restarted {}", unit);
                return Ok(unit);
            }
            log::warn!("systemd knows neither ssh.service nor sshd.service; trying `service`");
        }
        restart_with_service_command(hal, timeout)
    }

    pub fn restart_and_enable<H: SystemHal>(&self, hal: &H, name: &str, timeout: Duration) -> Result<()> {
        match self {
            ServiceManager::Systemd => {
                hal.command_status("systemctl", &["restart", name], timeout)
                    .with_context(|| format!("failed to restart {}", name))?;
                hal.command_status("systemctl", &["enable", name], timeout)
                    .with_context(|| format!("failed to enable {}", name))?;
            }
            ServiceManager::SysV => {
                hal.command_status("service", &[name, "restart"], timeout)
                    .with_context(|| format!("failed to restart {}", name))?;
                if hal.find_executable("update-rc.d").is_some() {
                    hal.command_status("update-rc.d", &[name, "enable"], timeout)
                        .with_context(|| format!("failed to enable {}", name))?;
                } else {
                    log::warn!("update-rc.d not found; {} may not start at boot", name);
                }
            }
        }
        log::info!("Restarted and enabled {}", name);
        Ok(())
    }
}

/// First of `ssh.service`/`sshd.service` present in `list-unit-files`.
fn known_ssh_unit<H: SystemHal>(hal: &H, timeout: Duration) -> Result<Option<String>> {
    let output = hal
        .command_output(
            "systemctl",
            &["list-unit-files", "--type=service", "--no-legend"],
            timeout,
        )
        .context("failed to list systemd unit files")?;
    let listing = String::from_utf8_lossy(&output.stdout);
    let units: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();

    Ok(SSH_UNITS
        .iter()
        .map(|name| format!("{}.service", name))
        .find(|unit| units.contains(&unit.as_str())))
}

fn confirm_active<H: SystemHal>(hal: &H, unit: &str, timeout: Duration) -> Result<()> {
    let output = hal
        .command_output("systemctl", &["is-active", unit], timeout)
        .with_context(|| format!("failed to query {}", unit))?;
    let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() {
        anyhow::bail!("{} is not active after restart (state: {})", unit, state);
    }
    Ok(())
}

/// `service ssh restart`, then `service sshd restart`. Both failing is fatal.
fn restart_with_service_command<H: SystemHal>(hal: &H, timeout: Duration) -> Result<String> {
    let mut failures = Vec::new();
    for name in SSH_UNITS {
        match hal.command_status("service", &[name, "restart"], timeout) {
            Ok(()) => {
                log::info!("Restarted {} via service", name);
                return Ok(name.to_string());
            }
            Err(err) => {
                log::warn!("service {} restart failed: {}", name, err);
                failures.push(err);
            }
        }
    }
    let last = failures
        .pop()
        .map(anyhow::Error::new)
        .unwrap_or_else(|| anyhow::anyhow!("no service name attempted"));
    Err(last.context("could not restart the SSH service under any known name"))
}
