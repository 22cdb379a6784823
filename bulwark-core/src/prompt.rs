//! Interactive collection of the run's inputs.
//!
//! Order: consent, username, password (twice), public key, SSH port, extra
//! HTTPS rule. Every question repeats until its answer validates.

use std::collections::VecDeque;

use anyhow::{anyhow, Context};
use bulwark_hal::HostInfoOps;

use crate::errors::Result;
use crate::identity::{Password, PendingIdentity};
use crate::ports::{validate_manual_port, PortOccupancy};
use crate::validation::{
    normalize_public_key, passwords_match, validate_password, validate_public_key, validate_username,
};

/// Terminal seam. The installer binary backs this with `dialoguer`.
pub trait Prompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Hidden input.
    fn password(&mut self, prompt: &str) -> Result<String>;

    /// Show a message: a validation diagnostic or a progress milestone.
    fn notify(&mut self, message: &str);
}

/// Ask until `validate` accepts, showing each rejection.
pub fn prompt_until_valid<T>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    default: Option<&str>,
    mut validate: impl FnMut(&str) -> std::result::Result<T, String>,
) -> Result<T> {
    loop {
        let answer = prompter.input(prompt, default)?;
        match validate(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reason) => prompter.notify(&reason),
        }
    }
}

pub fn ask_consent(prompter: &mut dyn Prompter) -> Result<bool> {
    prompter.confirm(
        "This will create an admin account, move SSH to a new port and reset the firewall. Continue?",
        false,
    )
}

pub fn collect_identity<H: HostInfoOps + ?Sized>(prompter: &mut dyn Prompter, hal: &H) -> Result<PendingIdentity> {
    let username = loop {
        let name = prompt_until_valid(prompter, "Admin username", None, |name| {
            validate_username(name).map(|_| name.to_string())
        })?;
        let exists = hal
            .user_exists(&name)
            .with_context(|| format!("failed to look up user '{}'", name))?;
        if !exists {
            break name;
        }
        prompter.notify(&format!("User '{}' already exists; pick another name.", name));
    };

    let password = loop {
        let first = prompter.password("Password")?;
        if let Err(reason) = validate_password(&first) {
            prompter.notify(&reason);
            continue;
        }
        let second = prompter.password("Confirm password")?;
        match passwords_match(&first, &second) {
            Ok(()) => break Password::new(first),
            Err(reason) => prompter.notify(&reason),
        }
    };

    let public_key = prompt_until_valid(prompter, "Public SSH key", None, |key| {
        validate_public_key(key).map(|_| normalize_public_key(key))
    })?;

    Ok(PendingIdentity {
        username,
        password,
        public_key,
    })
}

/// Offer `suggestion`; the operator may accept it or type another port.
pub fn choose_port(prompter: &mut dyn Prompter, suggestion: u16, occupancy: &PortOccupancy) -> Result<u16> {
    let default = suggestion.to_string();
    prompt_until_valid(prompter, "SSH port", Some(&default), |input| {
        validate_manual_port(input, occupancy).map_err(|rejection| rejection.to_string())
    })
}

pub fn ask_allow_https(prompter: &mut dyn Prompter) -> Result<bool> {
    prompter.confirm("Also allow HTTPS (443/tcp) through the firewall?", false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Confirm(bool),
    Text(String),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }
}

/// Replays canned answers; used by tests and non-interactive harnesses.
///
/// An empty text answer to a prompt with a default yields the default.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    pub asked: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Result<Answer> {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer left for '{}'", prompt))
    }

    fn next_text(&mut self, prompt: &str) -> Result<String> {
        match self.next(prompt)? {
            Answer::Text(text) => Ok(text),
            other => Err(anyhow!("expected text for '{}', script has {:?}", prompt, other)),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool> {
        match self.next(prompt)? {
            Answer::Confirm(value) => Ok(value),
            other => Err(anyhow!("expected yes/no for '{}', script has {:?}", prompt, other)),
        }
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let text = self.next_text(prompt)?;
        match default {
            Some(default) if text.is_empty() => Ok(default.to_string()),
            _ => Ok(text),
        }
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        self.next_text(prompt)
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_hal::FakeHal;

    const KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHq2mF3oN0hX1b2cNqzS7f9gYvWkq8yYq3Vt1p0bZ6nL admin@laptop";

    #[test]
    fn identity_reprompts_until_valid() {
        let hal = FakeHal::new();
        hal.add_user("taken");
        let mut prompter = ScriptedPrompter::new([
            Answer::text("x"),
            Answer::text("taken"),
            Answer::text("deploy"),
            Answer::text("short"),
            Answer::text("long enough pw"),
            Answer::text("long enough pW"),
            Answer::text("long enough pw"),
            Answer::text("long enough pw"),
            Answer::text("ssh-dss AAAA me@host"),
            Answer::text(KEY),
        ]);

        let identity = collect_identity(&mut prompter, &hal).unwrap();
        assert_eq!(identity.username, "deploy");
        assert_eq!(identity.password.expose(), "long enough pw");
        assert_eq!(identity.public_key, KEY);
        assert_eq!(prompter.remaining(), 0);
        assert_eq!(prompter.notices.len(), 5);
        assert!(prompter.notices[1].contains("already exists"));
        assert_eq!(prompter.notices[3], "Passwords do not match.");
    }

    #[test]
    fn port_prompt_defaults_to_suggestion() {
        let mut prompter = ScriptedPrompter::new([Answer::text("")]);
        let port = choose_port(&mut prompter, 40222, &PortOccupancy::default()).unwrap();
        assert_eq!(port, 40222);
    }

    #[test]
    fn port_prompt_explains_each_rejection() {
        let occupancy = PortOccupancy {
            listeners: [22, 8080].into_iter().collect(),
            sshd: [22].into_iter().collect(),
        };
        let mut prompter = ScriptedPrompter::new([
            Answer::text("abc"),
            Answer::text("80"),
            Answer::text("8080"),
            Answer::text("2200"),
        ]);
        let port = choose_port(&mut prompter, 40222, &occupancy).unwrap();
        assert_eq!(port, 2200);
        assert_eq!(prompter.notices.len(), 3);
        assert!(prompter.notices[0].contains("not a number"));
        assert!(prompter.notices[1].contains("outside"));
        assert!(prompter.notices[2].contains("already bound"));
    }

    #[test]
    fn exhausted_script_is_an_error() {
        let mut prompter = ScriptedPrompter::default();
        assert!(ask_consent(&mut prompter).is_err());
    }
}
