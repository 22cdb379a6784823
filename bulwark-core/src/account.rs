//! Administrative account creation.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bulwark_hal::{HalError, SystemHal};
use serde::Serialize;
use thiserror::Error;

use crate::identity::PendingIdentity;
use crate::settings::Settings;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("user '{0}' already exists")]
    AlreadyExists(String),

    #[error("administrative group '{0}' does not exist")]
    GroupMissing(String),

    #[error("{step} failed for '{user}'")]
    Command {
        step: &'static str,
        user: String,
        #[source]
        source: HalError,
    },

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedAccount {
    pub username: String,
    pub home: PathBuf,
    pub authorized_keys: PathBuf,
}

pub struct AccountProvisioner<'a, H: SystemHal> {
    hal: &'a H,
    home_root: &'a Path,
    admin_group: &'a str,
    login_shell: &'a str,
    timeout: Duration,
}

impl<'a, H: SystemHal> AccountProvisioner<'a, H> {
    pub fn new(hal: &'a H, settings: &'a Settings) -> Self {
        Self {
            hal,
            home_root: &settings.home_root,
            admin_group: &settings.admin_group,
            login_shell: &settings.login_shell,
            timeout: settings.timeouts.command(),
        }
    }

    /// Create the account, set its password, grant admin rights and install
    /// its key as the only authorized credential. Stops at the first failure.
    pub fn create_admin(&self, identity: PendingIdentity) -> Result<ProvisionedAccount, AccountError> {
        let PendingIdentity {
            username,
            password,
            public_key,
        } = identity;

        if self.lookup(&username, |hal, name| hal.user_exists(name))? {
            return Err(AccountError::AlreadyExists(username));
        }
        if !self.lookup(self.admin_group, |hal, name| hal.group_exists(name))? {
            return Err(AccountError::GroupMissing(self.admin_group.to_string()));
        }

        let home = self.home_root.join(&username);
        let home_arg = home.to_string_lossy().into_owned();

        log::info!("Creating account '{}' ({})", username, home.display());
        self.run(
            "useradd",
            &username,
            &["-m", "-d", &home_arg, "-s", self.login_shell, &username],
        )?;

        let line = format!("{}:{}\n", username, password.expose());
        self.hal
            .command_status_with_stdin("chpasswd", &[], line.as_bytes(), self.timeout)
            .map_err(|source| AccountError::Command {
                step: "chpasswd",
                user: username.clone(),
                source,
            })?;
        log::info!("Password set for '{}'", username);

        self.run("usermod", &username, &["-aG", self.admin_group, &username])?;
        log::info!("Added '{}' to group '{}'", username, self.admin_group);

        let ssh_dir = home.join(".ssh");
        let authorized_keys = ssh_dir.join("authorized_keys");
        install_authorized_key(&ssh_dir, &authorized_keys, &public_key)?;

        let ssh_dir_arg = ssh_dir.to_string_lossy().into_owned();
        let owner = format!("{}:", username);
        self.run("chown", &username, &["-R", &owner, &ssh_dir_arg])?;
        log::info!("Installed authorized key for '{}'", username);

        Ok(ProvisionedAccount {
            username,
            home,
            authorized_keys,
        })
    }

    fn lookup(
        &self,
        name: &str,
        query: impl FnOnce(&H, &str) -> bulwark_hal::HalResult<bool>,
    ) -> Result<bool, AccountError> {
        query(self.hal, name).map_err(|source| AccountError::Command {
            step: "account lookup",
            user: name.to_string(),
            source,
        })
    }

    fn run(&self, step: &'static str, user: &str, args: &[&str]) -> Result<(), AccountError> {
        self.hal
            .command_status(step, args, self.timeout)
            .map_err(|source| AccountError::Command {
                step,
                user: user.to_string(),
                source,
            })
    }
}

/// `.ssh` at 0700 and `authorized_keys` at 0600 holding exactly `key`.
fn install_authorized_key(ssh_dir: &Path, authorized_keys: &Path, key: &str) -> Result<(), AccountError> {
    let io_err = |action: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source| AccountError::Io { action, path, source }
    };

    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(ssh_dir)
        .map_err(io_err("create", ssh_dir))?;
    fs::set_permissions(ssh_dir, fs::Permissions::from_mode(0o700))
        .map_err(io_err("set permissions on", ssh_dir))?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(authorized_keys)
        .map_err(io_err("create", authorized_keys))?;
    file.write_all(format!("{}\n", key).as_bytes())
        .map_err(io_err("write", authorized_keys))?;
    fs::set_permissions(authorized_keys, fs::Permissions::from_mode(0o600))
        .map_err(io_err("set permissions on", authorized_keys))?;
    Ok(())
}
