//! Host information (read-only).
//!
//! This is "world-touching" (reads the account database, `PATH`) and belongs in the HAL.

use crate::HalResult;
use std::path::PathBuf;

pub trait HostInfoOps {
    /// Whether the current process runs with an effective uid of 0.
    fn is_root(&self) -> bool;
    fn user_exists(&self, name: &str) -> HalResult<bool>;
    fn group_exists(&self, name: &str) -> HalResult<bool>;
    /// Resolve an executable on `PATH`.
    fn find_executable(&self, program: &str) -> Option<PathBuf>;
}
