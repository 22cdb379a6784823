//! Centralized emoji + message helpers for consistent console copy.

pub mod emoji {
    pub const ERROR: &str = "❌";
    pub const CANCEL: &str = "🛑";
    pub const INFO: &str = "👉";
    pub const PARTY: &str = "🎉";
    pub const SEARCH: &str = "🔍";
    pub const SUCCESS: &str = "✅";
    pub const WARN: &str = "⚠️";
}

pub fn with(emoji: &str, message: &str) -> String {
    format!("{} {}", emoji, message)
}
