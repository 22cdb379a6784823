//! Host checks run before anything is changed.

use bulwark_hal::SystemHal;

use crate::errors::{BulwarkError, Result};
use crate::ports::listeners::pick_tool;
use crate::services::ServiceManager;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl PreflightCheck {
    fn new(name: impl Into<String>, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok,
            detail: detail.into(),
        }
    }
}

/// Tools every run needs. With package installation enabled, `ufw` and the
/// ban client may still be missing here; the package stage installs them.
pub fn required_tools(settings: &Settings) -> Vec<String> {
    let mut tools: Vec<String> = ["useradd", "usermod", "chpasswd", "chown"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    tools.push(settings.sshd_binary.clone());
    if settings.packages.skip {
        tools.push(crate::firewall::UFW.to_string());
        tools.push(settings.ban.client_binary.clone());
    } else {
        tools.push(settings.packages.manager.clone());
    }
    tools
}

pub fn missing_tools<H: SystemHal>(hal: &H, settings: &Settings) -> Vec<String> {
    required_tools(settings)
        .into_iter()
        .filter(|tool| hal.find_executable(tool).is_none())
        .collect()
}

/// Every check, for display. Nothing here fails.
pub fn run_checks<H: SystemHal>(hal: &H, settings: &Settings) -> Vec<PreflightCheck> {
    let mut checks = vec![PreflightCheck::new(
        "root",
        hal.is_root(),
        if hal.is_root() {
            "effective uid 0"
        } else {
            "not running as root"
        },
    )];

    for tool in required_tools(settings) {
        let found = hal.find_executable(&tool);
        let detail = found
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "not found on PATH".to_string());
        checks.push(PreflightCheck::new(tool, found.is_some(), detail));
    }

    let tool = pick_tool(hal);
    checks.push(PreflightCheck::new(
        "listener tool",
        tool.is_some(),
        tool.map(|p| p.name()).unwrap_or("need ss or netstat"),
    ));

    let services = ServiceManager::detect(hal);
    checks.push(PreflightCheck::new(
        "service manager",
        services.is_ok(),
        match services {
            Ok(ServiceManager::Systemd) => "systemctl",
            Ok(ServiceManager::SysV) => "service",
            Err(_) => "need systemctl or service",
        },
    ));

    if !settings.packages.skip {
        for installable in [crate::firewall::UFW, settings.ban.client_binary.as_str()] {
            let found = hal.find_executable(installable).is_some();
            let detail = if found { "present" } else { "will be installed" };
            checks.push(PreflightCheck::new(installable, true, detail));
        }
    }
    checks
}

/// Fail fast on the first unmet precondition.
pub fn ensure_ready<H: SystemHal>(hal: &H, settings: &Settings) -> Result<ServiceManager> {
    log::info!("🧪 Preflight checks");
    if !hal.is_root() {
        return Err(BulwarkError::NotRoot.into());
    }
    let missing = missing_tools(hal, settings);
    if !missing.is_empty() {
        return Err(BulwarkError::MissingTools(missing).into());
    }
    if pick_tool(hal).is_none() {
        return Err(BulwarkError::NoListenerTool.into());
    }
    let services = ServiceManager::detect(hal)?;
    log::info!("Preflight passed ({:?} service manager)", services);
    Ok(services)
}
