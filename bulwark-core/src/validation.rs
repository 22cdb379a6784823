//! Input validation guard rails for operator-provided values.
//!
//! Every validator returns a message suitable for showing next to the prompt.

use crate::settings::{MAX_PORT, MIN_PORT};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 16;
pub const PASSWORD_MIN: usize = 8;
/// Shortest key line accepted; anything shorter is almost certainly truncated.
pub const PUBLIC_KEY_MIN: usize = 80;

pub const KEY_ALGORITHMS: &[&str] = &[
    "ssh-rsa",
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
];

pub fn validate_username(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        return Err(format!(
            "Username must be {}-{} characters long.",
            USERNAME_MIN, USERNAME_MAX
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Username may only contain letters, digits, '_' and '-'.".to_string());
    }
    Ok(())
}

/// Collapse runs of whitespace and trim, so a pasted key is stored on one line.
pub fn normalize_public_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn validate_public_key(key: &str) -> Result<(), String> {
    let key = normalize_public_key(key);
    let tokens: Vec<&str> = key.split(' ').collect();
    if tokens.len() < 3 {
        return Err("Public key must look like '<algorithm> <key> <comment>'.".to_string());
    }
    if !KEY_ALGORITHMS.contains(&tokens[0]) {
        return Err(format!(
            "Unsupported key type '{}' (expected one of: {}).",
            tokens[0],
            KEY_ALGORITHMS.join(", ")
        ));
    }
    let payload = tokens[1];
    if !payload
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
    {
        return Err("Key material is not valid base64.".to_string());
    }
    if key.len() < PUBLIC_KEY_MIN {
        return Err("Public key is too short; was it truncated while pasting?".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(format!(
            "Password must be at least {} characters.",
            PASSWORD_MIN
        ));
    }
    if password.chars().any(char::is_control) {
        return Err("Password must not contain control characters.".to_string());
    }
    Ok(())
}

pub fn passwords_match(password: &str, confirmation: &str) -> Result<(), String> {
    if password != confirmation {
        return Err("Passwords do not match.".to_string());
    }
    Ok(())
}

pub fn validate_port_range(port: u32) -> Result<(), String> {
    if port < u32::from(MIN_PORT) || port > u32::from(MAX_PORT) {
        return Err(format!("Port must be between {} and {}.", MIN_PORT, MAX_PORT));
    }
    Ok(())
}
