//! 🛡️ bulwark core library.
//!
//! `bulwark-core` holds the hardening pipeline and its building blocks: settings,
//! config-file editing, port selection, account provisioning, SSH, firewall and
//! ban-daemon configuration. The installer binary supplies the real HAL and the
//! terminal prompter.

pub mod account;
pub mod ban_daemon;
pub mod cli;
pub mod config_file;
pub mod context;
pub mod errors;
pub mod firewall;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod packages;
pub mod ports;
pub mod preflight;
pub mod prompt;
pub mod report;
pub mod scanner;
pub mod services;
pub mod settings;
pub mod sshd;
pub mod validation;

pub use errors::{exit_code, BulwarkError, Result};
pub use orchestrator::{run_hardening, HardeningOptions, HardeningRun, Stage};
pub use settings::Settings;
