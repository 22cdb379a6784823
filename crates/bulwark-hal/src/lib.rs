//! bulwark host abstraction layer.
//!
//! Everything that touches the running host (spawning processes, asking who we
//! are, looking up accounts and tools) goes through the traits in [`hal`] so the
//! hardening workflow can be exercised in tests without root.

mod error;
pub mod hal;

pub use error::{HalError, HalResult};
pub use hal::fake_hal::CommandReply;
pub use hal::{FakeHal, HostInfoOps, LinuxHal, Operation, ProcessOps, SystemHal};
