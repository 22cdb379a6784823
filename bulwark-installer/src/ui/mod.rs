//! Terminal UI helpers: prompts, console copy and the end-of-run summary.

use std::io::IsTerminal;

pub mod prompter;
pub mod style;
pub mod summary;

pub fn ensure_interactive_terminal() -> anyhow::Result<()> {
    if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        return Ok(());
    }

    anyhow::bail!(
        "No TTY detected. The hardening run asks for a username, password and key.\n\
         Run it directly in a terminal (not piped or via script).\n\
         If using sudo, try: sudo -E bulwark"
    );
}
