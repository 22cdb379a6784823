//! Host firewall (ufw).

use std::time::Duration;

use anyhow::Context;
use bulwark_hal::SystemHal;

use crate::errors::{BulwarkError, Result};
use crate::settings::HTTPS_PORT;

pub const UFW: &str = "ufw";

/// The ufw invocations for a run, in order.
pub fn firewall_plan(ssh_port: u16, allow_https: bool) -> Vec<Vec<String>> {
    let mut plan: Vec<Vec<String>> = vec![
        vec!["--force".into(), "reset".into()],
        vec!["default".into(), "deny".into(), "incoming".into()],
        vec!["default".into(), "allow".into(), "outgoing".into()],
        vec!["allow".into(), format!("{}/tcp", ssh_port)],
    ];
    if allow_https {
        plan.push(vec!["allow".into(), format!("{}/tcp", HTTPS_PORT)]);
    }
    plan.push(vec!["--force".into(), "enable".into()]);
    plan
}

/// Reset and enable ufw so only `ssh_port` (and optionally 443) is reachable.
pub fn configure_firewall<H: SystemHal>(hal: &H, ssh_port: u16, allow_https: bool, timeout: Duration) -> Result<()> {
    if hal.find_executable(UFW).is_none() {
        return Err(BulwarkError::MissingTools(vec![UFW.to_string()]).into());
    }
    for args in firewall_plan(ssh_port, allow_https) {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        hal.command_status(UFW, &args, timeout)
            .with_context(|| format!("ufw {} failed", args.join(" ")))?;
    }
    log::info!(
        "Firewall enabled: {}/tcp{}",
        ssh_port,
        if allow_https { " and 443/tcp" } else { "" }
    );
    Ok(())
}
