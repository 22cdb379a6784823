//! Brute-force ban daemon (fail2ban) jail for the SSH port.

use anyhow::Context;
use bulwark_hal::SystemHal;

use crate::config_file::ConfigMutator;
use crate::errors::{BulwarkError, Result};
use crate::services::ServiceManager;
use crate::settings::{BanSettings, TimeoutSettings};

pub fn render_jail(ban: &BanSettings, ssh_port: u16) -> String {
    format!(
        "[DEFAULT]\n\
         ignoreip = {ignoreip}\n\
         bantime  = {bantime}\n\
         findtime = {findtime}\n\
         maxretry = {maxretry}\n\
         \n\
         [sshd]\n\
         enabled  = true\n\
         port     = {port}\n\
         logpath  = {logpath}\n\
         backend  = {backend}\n",
        ignoreip = ban.ignoreip,
        bantime = ban.bantime,
        findtime = ban.findtime,
        maxretry = ban.maxretry,
        port = ssh_port,
        logpath = ban.logpath,
        backend = ban.backend,
    )
}

/// Write the jail, then restart and enable the daemon.
pub fn configure_ban_daemon<H: SystemHal>(
    hal: &H,
    mutator: &ConfigMutator,
    services: ServiceManager,
    ban: &BanSettings,
    timeouts: &TimeoutSettings,
    ssh_port: u16,
) -> Result<()> {
    if hal.find_executable(&ban.client_binary).is_none() {
        return Err(BulwarkError::MissingTools(vec![ban.client_binary.clone()]).into());
    }

    let jail = render_jail(ban, ssh_port);
    if mutator.replace(&ban.jail_path, &jail)? {
        log::info!("🛡️ Wrote {} (sshd jail on port {})", ban.jail_path.display(), ssh_port);
    } else {
        log::info!("{} already up to date", ban.jail_path.display());
    }

    services
        .restart_and_enable(hal, &ban.service, timeouts.command())
        .with_context(|| format!("failed to activate {}", ban.service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_hal::FakeHal;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn jail_references_the_port() {
        let jail = render_jail(&BanSettings::default(), 40222);
        assert!(jail.starts_with("[DEFAULT]\n"));
        assert!(jail.contains("\n[sshd]\nenabled  = true\nport     = 40222\n"));
        assert!(jail.contains("bantime  = 1h\n"));
        assert!(jail.contains("findtime = 10m\n"));
        assert!(jail.contains("maxretry = 5\n"));
        assert!(jail.contains("logpath  = /var/log/auth.log\n"));
        assert!(jail.contains("backend  = auto\n"));
    }

    #[test]
    fn writes_jail_and_restarts() {
        let tmp = tempdir().unwrap();
        let ban = BanSettings {
            jail_path: tmp.path().join("fail2ban/jail.local"),
            ..BanSettings::default()
        };
        let hal = FakeHal::new();
        let mutator = ConfigMutator::with_stamp("20240102030405");

        configure_ban_daemon(
            &hal,
            &mutator,
            ServiceManager::Systemd,
            &ban,
            &TimeoutSettings::default(),
            40222,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&ban.jail_path).unwrap(), render_jail(&ban, 40222));
        assert_eq!(
            hal.command_lines(),
            vec!["systemctl restart fail2ban", "systemctl enable fail2ban"]
        );
        assert!(mutator.backups().is_empty());
    }

    #[test]
    fn existing_jail_is_backed_up() {
        let tmp = tempdir().unwrap();
        let ban = BanSettings {
            jail_path: tmp.path().join("jail.local"),
            ..BanSettings::default()
        };
        fs::write(&ban.jail_path, "[sshd]\nenabled = false\n").unwrap();
        let hal = FakeHal::new();
        let mutator = ConfigMutator::with_stamp("20240102030405");

        configure_ban_daemon(
            &hal,
            &mutator,
            ServiceManager::Systemd,
            &ban,
            &TimeoutSettings::default(),
            2200,
        )
        .unwrap();

        let backups = mutator.backups();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "[sshd]\nenabled = false\n");
    }
}
