use std::fmt;

/// Plaintext password held only in memory. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// The administrator collected from the operator, consumed once by account
/// provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIdentity {
    pub username: String,
    pub password: Password,
    pub public_key: String,
}
