//! OpenSSH daemon hardening.

use std::path::Path;

use anyhow::Context;
use bulwark_hal::SystemHal;
use thiserror::Error;

use crate::config_file::ConfigMutator;
use crate::errors::Result;
use crate::services::ServiceManager;
use crate::settings::Settings;

/// Directives applied besides `Port`.
pub const HARDENED_DIRECTIVES: [(&str, &str); 4] = [
    ("PermitRootLogin", "no"),
    ("PasswordAuthentication", "no"),
    ("ChallengeResponseAuthentication", "no"),
    ("UsePAM", "yes"),
];

#[derive(Error, Debug)]
#[error("sshd rejected {}; the previous file is kept as a backup and the service was not restarted", path.display())]
pub struct SshdSyntaxError {
    pub path: std::path::PathBuf,
}

/// Result of a successful [`SshHardener::harden`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardenedSshd {
    pub unit: String,
    /// False when the configuration already held every directive.
    pub config_changed: bool,
}

pub struct SshHardener<'a, H: SystemHal> {
    hal: &'a H,
    mutator: &'a ConfigMutator,
    settings: &'a Settings,
    services: ServiceManager,
}

impl<'a, H: SystemHal> SshHardener<'a, H> {
    pub fn new(hal: &'a H, mutator: &'a ConfigMutator, settings: &'a Settings, services: ServiceManager) -> Self {
        Self {
            hal,
            mutator,
            settings,
            services,
        }
    }

    /// Rewrite the daemon configuration for `port`, check it with `sshd -t`
    /// and restart the service.
    pub fn harden(&self, port: u16) -> Result<HardenedSshd> {
        let path = self.settings.sshd_config.as_path();
        let config_changed = self.apply_directives(path, port)?;
        self.validate_syntax(path)?;
        let unit = self
            .services
            .restart_ssh(self.hal, self.settings.timeouts.command())
            .context("SSH configuration is valid but the service could not be restarted")?;
        Ok(HardenedSshd { unit, config_changed })
    }

    /// Returns whether the file content changed.
    pub fn apply_directives(&self, path: &Path, port: u16) -> Result<bool> {
        let port = port.to_string();
        let mut changed = self.mutator.upsert(path, "Port", &port)?;
        for (key, value) in HARDENED_DIRECTIVES {
            changed |= self.mutator.upsert(path, key, value)?;
        }
        changed |= self.mutator.dedupe(path, "Port")?;
        if changed {
            log::info!("Applied hardened directives to {} (Port {})", path.display(), port);
        } else {
            log::info!("{} already hardened for Port {}", path.display(), port);
        }
        Ok(changed)
    }

    pub fn validate_syntax(&self, path: &Path) -> Result<()> {
        let path_arg = path.to_string_lossy();
        self.hal
            .command_status(
                &self.settings.sshd_binary,
                &["-t", "-f", &path_arg],
                self.settings.timeouts.command(),
            )
            .context(SshdSyntaxError {
                path: path.to_path_buf(),
            })?;
        log::info!("{} passed sshd syntax check", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{backup_path, ConfigDocument};
    use bulwark_hal::{CommandReply, FakeHal};
    use std::fs;
    use tempfile::tempdir;

    const STAMP: &str = "20240102030405";

    fn settings(path: &Path) -> Settings {
        Settings {
            sshd_config: path.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn hardens_and_restarts() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sshd_config");
        fs::write(
            &path,
            "Include /etc/ssh/sshd_config.d/*.conf\n#Port 22\nPermitRootLogin yes\nX11Forwarding yes\nUsePAM yes\n",
        )
        .unwrap();
        let hal = FakeHal::new();
        hal.on_command_args("systemctl", &["list-unit-files"], CommandReply::success("ssh.service enabled\n"));
        let settings = settings(&path);
        let mutator = ConfigMutator::with_stamp(STAMP);

        let hardened = SshHardener::new(&hal, &mutator, &settings, ServiceManager::Systemd)
            .harden(40222)
            .unwrap();

        assert_eq!(hardened.unit, "ssh.service");
        assert!(hardened.config_changed);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Include /etc/ssh/sshd_config.d/*.conf\n\
             Port 40222\n\
             PermitRootLogin no\n\
             X11Forwarding yes\n\
             UsePAM yes\n\
             PasswordAuthentication no\n\
             ChallengeResponseAuthentication no\n"
        );
        let lines = hal.command_lines();
        assert_eq!(lines[0], format!("sshd -t -f {}", path.display()));
        assert_eq!(lines.last().unwrap(), "systemctl is-active ssh.service");
    }

    #[test]
    fn stale_port_lines_are_swept() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sshd_config");
        fs::write(&path, "Port 22\nAddressFamily any\n#Port 2222\n").unwrap();
        let hal = FakeHal::new();
        let settings = settings(&path);
        let mutator = ConfigMutator::with_stamp(STAMP);

        SshHardener::new(&hal, &mutator, &settings, ServiceManager::SysV)
            .apply_directives(&path, 5022)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| l.contains("Port ")).count(), 1);
        assert!(content.starts_with("AddressFamily any\nPort 5022\n"));
    }

    #[test]
    fn syntax_failure_aborts_before_restart() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sshd_config");
        fs::write(&path, "Port 22\n").unwrap();
        let hal = FakeHal::new();
        hal.on_command("sshd", CommandReply::failure(255, "line 7: Bad configuration option"));
        let settings = settings(&path);
        let mutator = ConfigMutator::with_stamp(STAMP);

        let err = SshHardener::new(&hal, &mutator, &settings, ServiceManager::Systemd)
            .harden(40222)
            .unwrap_err();

        assert!(err.downcast_ref::<SshdSyntaxError>().is_some());
        assert_eq!(crate::errors::exit_code(&err), 255);
        assert_eq!(hal.operation_count(), 1);
        assert_eq!(
            fs::read_to_string(backup_path(&path, STAMP)).unwrap(),
            "Port 22\n"
        );
        assert!(fs::read_to_string(&path).unwrap().contains("Port 40222"));
    }

    #[test]
    fn second_run_leaves_content_unchanged() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sshd_config");
        fs::write(&path, "#Port 22\nPermitRootLogin prohibit-password\n").unwrap();
        let hal = FakeHal::new();
        let settings = settings(&path);

        let first = ConfigMutator::with_stamp(STAMP);
        assert!(SshHardener::new(&hal, &first, &settings, ServiceManager::SysV)
            .apply_directives(&path, 5022)
            .unwrap());
        let after_first = fs::read_to_string(&path).unwrap();

        let second = ConfigMutator::with_stamp("20240102030500");
        assert!(!SshHardener::new(&hal, &second, &settings, ServiceManager::SysV)
            .apply_directives(&path, 5022)
            .unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
        assert_eq!(second.backups().len(), 1);
    }

    #[test]
    fn empty_config_gets_each_directive_once() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sshd_config");
        fs::write(&path, "").unwrap();
        let hal = FakeHal::new();
        let settings = settings(&path);
        let mutator = ConfigMutator::with_stamp(STAMP);

        let hardened = SshHardener::new(&hal, &mutator, &settings, ServiceManager::SysV)
            .harden(40222)
            .unwrap();

        assert_eq!(hardened.unit, "ssh");
        let content = fs::read_to_string(&path).unwrap();
        let doc = ConfigDocument::parse(&content);
        let port = doc.active("Port");
        assert_eq!(port.len(), 1);
        assert_eq!(port[0].value, "40222");
        for (key, value) in HARDENED_DIRECTIVES {
            let found = doc.active(key);
            assert_eq!(found.len(), 1, "{} appears {} times", key, found.len());
            assert_eq!(found[0].value, value);
        }
        assert_eq!(content.lines().count(), 5);
        assert_eq!(
            hal.command_lines(),
            vec![format!("sshd -t -f {}", path.display()), "service ssh restart".to_string()]
        );
    }
}
