//! The hardening pipeline.
//!
//! Stages run strictly in order and every run starts from the first one.
//! SSH is reconfigured and restarted before the firewall is narrowed.

use bulwark_hal::SystemHal;
use bulwark_workflow::{StageDefinition, StageFn, StageRunner};

use crate::account::AccountProvisioner;
use crate::ban_daemon::configure_ban_daemon;
use crate::config_file::ConfigMutator;
use crate::context::RunContext;
use crate::errors::{BulwarkError, Result};
use crate::firewall::configure_firewall;
use crate::packages::update_packages;
use crate::ports::{PortAllocator, PortOccupancy};
use crate::preflight::ensure_ready;
use crate::prompt::{ask_allow_https, ask_consent, choose_port, collect_identity, Prompter};
use crate::report::RunReport;
use crate::scanner::find_and_fix_insecure;
use crate::settings::Settings;
use crate::sshd::SshHardener;

/// Name recorded when the run ends before the first stage.
pub const START: &str = "start";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrivilegeCheck,
    PackagesUpdated,
    IdentityCollected,
    AccountCreated,
    PortChosen,
    SshHardened,
    InsecureConfigsScanned,
    FirewallConfigured,
    BanDaemonConfigured,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::PrivilegeCheck,
        Stage::PackagesUpdated,
        Stage::IdentityCollected,
        Stage::AccountCreated,
        Stage::PortChosen,
        Stage::SshHardened,
        Stage::InsecureConfigsScanned,
        Stage::FirewallConfigured,
        Stage::BanDaemonConfigured,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::PrivilegeCheck => "privilege-check",
            Stage::PackagesUpdated => "packages-updated",
            Stage::IdentityCollected => "identity-collected",
            Stage::AccountCreated => "account-created",
            Stage::PortChosen => "port-chosen",
            Stage::SshHardened => "ssh-hardened",
            Stage::InsecureConfigsScanned => "insecure-configs-scanned",
            Stage::FirewallConfigured => "firewall-configured",
            Stage::BanDaemonConfigured => "ban-daemon-configured",
        }
    }

    fn action<'a, H: SystemHal + 'a>(self) -> StageFn<'a, RunContext<'a, H>> {
        match self {
            Stage::PrivilegeCheck => Box::new(privilege_check::<H>),
            Stage::PackagesUpdated => Box::new(packages_updated::<H>),
            Stage::IdentityCollected => Box::new(identity_collected::<H>),
            Stage::AccountCreated => Box::new(account_created::<H>),
            Stage::PortChosen => Box::new(port_chosen::<H>),
            Stage::SshHardened => Box::new(ssh_hardened::<H>),
            Stage::InsecureConfigsScanned => Box::new(insecure_configs_scanned::<H>),
            Stage::FirewallConfigured => Box::new(firewall_configured::<H>),
            Stage::BanDaemonConfigured => Box::new(ban_daemon_configured::<H>),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HardeningOptions {
    /// Skip the consent prompt.
    pub assume_yes: bool,
    /// Fixed backup timestamp instead of the current time.
    pub backup_stamp: Option<String>,
}

/// Outcome of a run. The report is filled in whether or not the run succeeded.
pub struct HardeningRun {
    pub report: RunReport,
    pub result: Result<()>,
}

pub fn run_hardening<H: SystemHal>(
    hal: &H,
    settings: &Settings,
    prompter: &mut dyn Prompter,
    options: &HardeningOptions,
) -> HardeningRun {
    let mut report = RunReport::new();
    log::info!("🛡️ bulwark run started");

    if !options.assume_yes {
        let consent = ask_consent(prompter).and_then(|yes| {
            if yes {
                Ok(())
            } else {
                Err(BulwarkError::ConsentDeclined.into())
            }
        });
        if let Err(err) = consent {
            log::warn!("Run not started: {:#}", err);
            report.progress.mark_aborted(START, format!("{:#}", err));
            report.finish();
            return HardeningRun {
                report,
                result: Err(err),
            };
        }
    }

    let mutator = match &options.backup_stamp {
        Some(stamp) => ConfigMutator::with_stamp(stamp.clone()),
        None => ConfigMutator::new(),
    };
    let mut ctx = RunContext::new(settings, hal, prompter, mutator);
    let stages: Vec<StageDefinition<'_, RunContext<'_, H>>> = Stage::ALL
        .iter()
        .map(|stage| StageDefinition {
            name: stage.name(),
            run: stage.action::<H>(),
        })
        .collect();

    let result = StageRunner::new().run(&mut ctx, &stages, &mut report.progress);

    report.ssh_port = ctx.try_port();
    report.username = ctx.account().map(|account| account.username.clone());
    report.ssh_service = ctx.ssh_unit.clone();
    report.https_allowed = ctx.try_allow_https();
    report.firewall_enabled = ctx.firewall_enabled;
    report.ban_daemon_enabled = ctx.ban_enabled;
    report.changed_files = ctx.changed_files.clone();
    report.backups = ctx.mutator.backups();
    report.finish();

    match &result {
        Ok(()) => log::info!(
            "🎉 bulwark run complete: user={} port={} firewall={} ban={}",
            report.username.as_deref().unwrap_or("-"),
            report.ssh_port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            report.firewall_enabled,
            report.ban_daemon_enabled
        ),
        Err(err) => log::error!("bulwark run aborted: {:#}", err),
    }

    HardeningRun { report, result }
}

fn milestone<H: SystemHal>(ctx: &mut RunContext<'_, H>, message: String) {
    log::info!("{}", message);
    ctx.prompter.notify(&message);
}

fn privilege_check<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let services = ensure_ready(ctx.hal, ctx.settings)?;
    ctx.set_services(services)
}

fn packages_updated<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    update_packages(ctx.hal, &ctx.settings.packages, &ctx.settings.timeouts)
}

fn identity_collected<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let identity = collect_identity(&mut *ctx.prompter, ctx.hal)?;
    log::info!("Collected identity for '{}'", identity.username);
    ctx.set_identity(identity)
}

fn account_created<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let identity = ctx.take_identity()?;
    let account = AccountProvisioner::new(ctx.hal, ctx.settings).create_admin(identity)?;
    let message = format!("Admin account '{}' created", account.username);
    ctx.set_account(account)?;
    milestone(ctx, message);
    Ok(())
}

fn port_chosen<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let occupancy = PortOccupancy::discover(ctx.hal, ctx.settings.timeouts.command())?;
    let suggestion = PortAllocator::from_settings(&ctx.settings.ports).suggest_port(&occupancy);
    log::info!("Suggested SSH port {}", suggestion);

    let port = choose_port(&mut *ctx.prompter, suggestion, &occupancy)?;
    ctx.freeze_port(port)?;
    let allow_https = ask_allow_https(&mut *ctx.prompter)?;
    ctx.set_allow_https(allow_https)?;
    milestone(ctx, format!("SSH will listen on port {}", port));
    Ok(())
}

fn ssh_hardened<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let port = ctx.port()?;
    let hardened = SshHardener::new(ctx.hal, &ctx.mutator, ctx.settings, ctx.services()?).harden(port)?;
    if hardened.config_changed {
        ctx.changed_files.push(ctx.settings.sshd_config.clone());
    }
    ctx.ssh_unit = Some(hardened.unit);
    milestone(ctx, format!("SSH hardened and restarted on port {}", port));
    Ok(())
}

fn insecure_configs_scanned<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let changed = find_and_fix_insecure(&ctx.settings.scan_root, &ctx.mutator)?;
    if changed.is_empty() {
        log::info!("No other configuration enables password authentication");
        return Ok(());
    }

    // Fixed fragments only take effect after another checked restart.
    let hardener = SshHardener::new(ctx.hal, &ctx.mutator, ctx.settings, ctx.services()?);
    hardener.validate_syntax(&ctx.settings.sshd_config)?;
    let unit = ctx
        .services()?
        .restart_ssh(ctx.hal, ctx.settings.timeouts.command())?;
    ctx.ssh_unit = Some(unit);

    let count = changed.len();
    for path in changed {
        if !ctx.changed_files.contains(&path) {
            ctx.changed_files.push(path);
        }
    }
    milestone(ctx, format!("Disabled password authentication in {} more file(s)", count));
    Ok(())
}

fn firewall_configured<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let port = ctx.port()?;
    configure_firewall(ctx.hal, port, ctx.allow_https()?, ctx.settings.timeouts.command())?;
    ctx.firewall_enabled = true;
    milestone(ctx, format!("Firewall enabled for port {}", port));
    Ok(())
}

fn ban_daemon_configured<H: SystemHal>(ctx: &mut RunContext<'_, H>) -> Result<()> {
    let port = ctx.port()?;
    configure_ban_daemon(
        ctx.hal,
        &ctx.mutator,
        ctx.services()?,
        &ctx.settings.ban,
        &ctx.settings.timeouts,
        port,
    )?;
    ctx.ban_enabled = true;
    ctx.changed_files.push(ctx.settings.ban.jail_path.clone());
    milestone(ctx, format!("Ban daemon watching port {}", port));
    Ok(())
}
