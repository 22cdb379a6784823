//! State threaded through every stage of one run.
//!
//! Values decided by a stage (account, port, HTTPS choice) are write-once:
//! a second decision or a read before the decision is an error.

use std::path::PathBuf;

use bulwark_hal::SystemHal;
use once_cell::unsync::OnceCell;

use crate::account::ProvisionedAccount;
use crate::config_file::ConfigMutator;
use crate::errors::{BulwarkError, Result};
use crate::identity::PendingIdentity;
use crate::prompt::Prompter;
use crate::services::ServiceManager;
use crate::settings::Settings;

pub struct RunContext<'a, H: SystemHal> {
    pub settings: &'a Settings,
    pub hal: &'a H,
    pub prompter: &'a mut dyn Prompter,
    pub mutator: ConfigMutator,
    services: OnceCell<ServiceManager>,
    identity: Option<PendingIdentity>,
    account: OnceCell<ProvisionedAccount>,
    port: OnceCell<u16>,
    allow_https: OnceCell<bool>,
    pub ssh_unit: Option<String>,
    pub changed_files: Vec<PathBuf>,
    pub firewall_enabled: bool,
    pub ban_enabled: bool,
}

fn freeze<T>(cell: &OnceCell<T>, value: T, what: &'static str) -> Result<()> {
    cell.set(value)
        .map_err(|_| BulwarkError::AlreadyDecided(what).into())
}

fn decided<T: Copy>(cell: &OnceCell<T>, what: &'static str) -> Result<T> {
    cell.get()
        .copied()
        .ok_or_else(|| BulwarkError::NotYetDecided(what).into())
}

impl<'a, H: SystemHal> RunContext<'a, H> {
    pub fn new(settings: &'a Settings, hal: &'a H, prompter: &'a mut dyn Prompter, mutator: ConfigMutator) -> Self {
        Self {
            settings,
            hal,
            prompter,
            mutator,
            services: OnceCell::new(),
            identity: None,
            account: OnceCell::new(),
            port: OnceCell::new(),
            allow_https: OnceCell::new(),
            ssh_unit: None,
            changed_files: Vec::new(),
            firewall_enabled: false,
            ban_enabled: false,
        }
    }

    pub fn set_services(&self, services: ServiceManager) -> Result<()> {
        freeze(&self.services, services, "service manager")
    }

    pub fn services(&self) -> Result<ServiceManager> {
        decided(&self.services, "service manager")
    }

    pub fn set_identity(&mut self, identity: PendingIdentity) -> Result<()> {
        if self.identity.is_some() || self.account.get().is_some() {
            return Err(BulwarkError::AlreadyDecided("identity").into());
        }
        self.identity = Some(identity);
        Ok(())
    }

    /// Hand the identity over exactly once.
    pub fn take_identity(&mut self) -> Result<PendingIdentity> {
        self.identity
            .take()
            .ok_or_else(|| BulwarkError::NotYetDecided("identity").into())
    }

    pub fn set_account(&self, account: ProvisionedAccount) -> Result<()> {
        freeze(&self.account, account, "account")
    }

    pub fn account(&self) -> Option<&ProvisionedAccount> {
        self.account.get()
    }

    pub fn freeze_port(&self, port: u16) -> Result<()> {
        freeze(&self.port, port, "SSH port")
    }

    pub fn port(&self) -> Result<u16> {
        decided(&self.port, "SSH port")
    }

    pub fn try_port(&self) -> Option<u16> {
        self.port.get().copied()
    }

    pub fn set_allow_https(&self, allow: bool) -> Result<()> {
        freeze(&self.allow_https, allow, "HTTPS rule")
    }

    pub fn allow_https(&self) -> Result<bool> {
        decided(&self.allow_https, "HTTPS rule")
    }

    pub fn try_allow_https(&self) -> Option<bool> {
        self.allow_https.get().copied()
    }
}
