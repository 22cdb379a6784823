//! Package index refresh and installation of the firewall and ban daemon.

use anyhow::Context;
use bulwark_hal::ProcessOps;

use crate::errors::Result;
use crate::settings::{PackageSettings, TimeoutSettings};

pub fn update_packages<H: ProcessOps + ?Sized>(
    hal: &H,
    packages: &PackageSettings,
    timeouts: &TimeoutSettings,
) -> Result<()> {
    if packages.skip {
        log::info!("Package installation skipped by configuration");
        return Ok(());
    }

    let refresh: Vec<&str> = packages.refresh_args.iter().map(String::as_str).collect();
    if !refresh.is_empty() {
        log::info!("📦 Refreshing package index ({} {})", packages.manager, refresh.join(" "));
        hal.command_status(&packages.manager, &refresh, timeouts.packages())
            .context("failed to refresh the package index")?;
    }

    let mut install: Vec<&str> = packages.install_args.iter().map(String::as_str).collect();
    install.extend(packages.names.iter().map(String::as_str));
    log::info!("📦 Installing {}", packages.names.join(", "));
    hal.command_status(&packages.manager, &install, timeouts.packages())
        .with_context(|| format!("failed to install {}", packages.names.join(", ")))?;
    Ok(())
}
