//! SSH port selection.

pub mod listeners;

use std::collections::BTreeSet;
use std::time::Duration;

use bulwark_hal::SystemHal;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::errors::{BulwarkError, Result};
use crate::settings::{PortSettings, MAX_PORT, MIN_PORT};
use listeners::{pick_tool, Listener};

/// Process name the SSH daemon's sockets are attributed to.
pub const SSHD_PROCESS: &str = "sshd";

/// Snapshot of the local TCP listeners taken when the port is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortOccupancy {
    pub listeners: BTreeSet<u16>,
    pub sshd: BTreeSet<u16>,
}

impl PortOccupancy {
    pub fn from_listeners(listeners: &[Listener]) -> Self {
        let mut occupancy = Self::default();
        for listener in listeners {
            occupancy.listeners.insert(listener.port);
            if listener.held_by(SSHD_PROCESS) {
                occupancy.sshd.insert(listener.port);
            }
        }
        occupancy
    }

    pub fn is_free(&self, port: u16) -> bool {
        !self.listeners.contains(&port) && !self.sshd.contains(&port)
    }

    /// Scan the host with the first available listener tool.
    pub fn discover<H: SystemHal>(hal: &H, timeout: Duration) -> Result<Self> {
        let tool = pick_tool(hal).ok_or(BulwarkError::NoListenerTool)?;
        let listeners = tool.scan(hal, timeout)?;
        let occupancy = Self::from_listeners(&listeners);
        log::info!(
            "Listening TCP ports: {:?} (sshd: {:?})",
            occupancy.listeners,
            occupancy.sshd
        );
        Ok(occupancy)
    }
}

/// Why an operator-entered port was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortRejection {
    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("{0} is outside the allowed range 1024-65535")]
    OutOfRange(String),

    #[error("port {0} is already used by the running SSH daemon")]
    HeldBySshd(u16),

    #[error("port {0} is already bound by another local service")]
    InUse(u16),
}

pub fn validate_manual_port(input: &str, occupancy: &PortOccupancy) -> std::result::Result<u16, PortRejection> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(PortRejection::NotNumeric(input.to_string()));
    }
    let port = match input.parse::<u32>() {
        Ok(port) if (u32::from(MIN_PORT)..=u32::from(MAX_PORT)).contains(&port) => port as u16,
        _ => return Err(PortRejection::OutOfRange(input.to_string())),
    };
    if occupancy.sshd.contains(&port) {
        return Err(PortRejection::HeldBySshd(port));
    }
    if occupancy.listeners.contains(&port) {
        return Err(PortRejection::InUse(port));
    }
    Ok(port)
}

pub struct PortAllocator<R: Rng> {
    rng: R,
    attempts: u32,
    fallback: u16,
}

impl PortAllocator<StdRng> {
    /// Seeded when `settings.seed` is set, otherwise from OS entropy.
    pub fn from_settings(settings: &PortSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(rng, settings.attempts, settings.fallback)
    }
}

impl<R: Rng> PortAllocator<R> {
    pub fn new(rng: R, attempts: u32, fallback: u16) -> Self {
        Self {
            rng,
            attempts,
            fallback,
        }
    }

    /// Draw uniformly from the unprivileged range until a free port turns up.
    ///
    /// The fallback returned after the attempt budget is spent is not checked;
    /// callers validate it like any operator input.
    pub fn suggest_port(&mut self, occupancy: &PortOccupancy) -> u16 {
        for _ in 0..self.attempts {
            let candidate = self.rng.gen_range(MIN_PORT..=MAX_PORT);
            if occupancy.is_free(candidate) {
                return candidate;
            }
        }
        log::warn!(
            "No free port found in {} attempts, suggesting fallback {}",
            self.attempts,
            self.fallback
        );
        self.fallback
    }
}
