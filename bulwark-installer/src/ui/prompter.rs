//! `dialoguer`-backed prompts.

use anyhow::{Context, Result};
use bulwark_core::prompt::Prompter;
use dialoguer::{Confirm, Input, Password};

use super::style::{emoji, with};

#[derive(Debug, Default)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for DialoguerPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation input")
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .with_context(|| format!("Failed to read '{}'", prompt))
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .interact()
            .with_context(|| format!("Failed to read '{}'", prompt))
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{}", with(emoji::INFO, message));
    }
}
