//! CLI argument parsing for bulwark
//!
//! Running without a subcommand performs the interactive hardening run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::errors::Result;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "bulwark")]
#[command(about = "🛡️ bulwark - idempotent SSH host hardening")]
#[command(long_about = "🛡️ bulwark - idempotent SSH host hardening\n\n\
    Creates a key-only admin account, moves SSH to a fresh port, disables root and\n\
    password logins, then enables a firewall and a brute-force ban daemon.\n\n\
    Run without arguments for the interactive run, or `bulwark preflight` to only\n\
    check the host.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Settings file (TOML); omitted fields use built-in defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Audit log file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// SSH daemon configuration file to harden
    #[arg(long, global = true)]
    pub sshd_config: Option<PathBuf>,

    /// Directory scanned for configs that still allow password logins
    #[arg(long, global = true)]
    pub scan_root: Option<PathBuf>,

    /// Do not refresh the package index or install ufw/fail2ban
    #[arg(long, global = true)]
    pub skip_packages: bool,

    /// Write a JSON run report here
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Answer the initial confirmation with yes
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 🔍 Check privileges and required tools without changing anything
    Preflight,
}

impl Cli {
    /// Settings file (if any) with command-line overrides applied on top.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(path) = &self.log_file {
            settings.log_file = path.clone();
        }
        if let Some(path) = &self.sshd_config {
            settings.sshd_config = path.clone();
        }
        if let Some(path) = &self.scan_root {
            settings.scan_root = path.clone();
        }
        if let Some(path) = &self.report {
            settings.report_path = Some(path.clone());
        }
        if self.skip_packages {
            settings.packages.skip = true;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_hardening_run() {
        let cli = Cli::try_parse_from(["bulwark"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.yes);
        assert_eq!(cli.settings().unwrap(), Settings::default());
    }

    #[test]
    fn flags_override_settings_file() {
        let tmp = tempdir().unwrap();
        let config = tmp.path().join("bulwark.toml");
        fs::write(&config, "sshd_config = \"/srv/sshd_config\"\nadmin_group = \"wheel\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "bulwark",
            "--config",
            config.to_str().unwrap(),
            "--sshd-config",
            "/tmp/sshd_config",
            "--skip-packages",
            "--report",
            "/tmp/report.json",
            "-y",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();

        assert!(cli.yes);
        assert_eq!(settings.sshd_config, PathBuf::from("/tmp/sshd_config"));
        assert_eq!(settings.admin_group, "wheel");
        assert!(settings.packages.skip);
        assert_eq!(settings.report_path, Some(PathBuf::from("/tmp/report.json")));
    }

    #[test]
    fn preflight_subcommand_accepts_global_flags() {
        let cli = Cli::try_parse_from(["bulwark", "preflight", "--skip-packages"]).unwrap();
        assert_eq!(cli.command, Some(Command::Preflight));
        assert!(cli.skip_packages);
    }
}
