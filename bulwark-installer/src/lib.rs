//! bulwark command-line entry point.

use std::io::{self, Write};

use bulwark_core::cli::{Cli, Command};
use bulwark_core::errors::EXIT_FAILURE;
use bulwark_core::orchestrator::{run_hardening, HardeningOptions};
use bulwark_core::prompt::Prompter;
use bulwark_core::{exit_code, logging, preflight, Settings};
use bulwark_hal::{LinuxHal, SystemHal};
use clap::Parser;

pub mod ui;

use ui::prompter::DialoguerPrompter;
use ui::style::{emoji, with};

/// Parse arguments, run, and return the process exit status.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{}", with(emoji::ERROR, &format!("{:#}", err)));
            return EXIT_FAILURE;
        }
    };
    logging::init_with(&settings.log_file);

    let hal = LinuxHal::new();
    let mut stdout = io::stdout();
    match cli.command {
        Some(Command::Preflight) => run_preflight(&hal, &settings, &mut stdout),
        None => {
            if let Err(err) = ui::ensure_interactive_terminal() {
                eprintln!("{}", with(emoji::ERROR, &format!("{:#}", err)));
                return EXIT_FAILURE;
            }
            let options = HardeningOptions {
                assume_yes: cli.yes,
                ..HardeningOptions::default()
            };
            let mut prompter = DialoguerPrompter::new();
            run_with(&hal, &settings, &mut prompter, &options, &mut stdout)
        }
    }
}

/// Print every preflight check; exit non-zero when the host is not ready.
pub fn run_preflight<H: SystemHal>(hal: &H, settings: &Settings, out: &mut dyn Write) -> i32 {
    log::info!("🔍 Running preflight checks...");
    let checks = preflight::run_checks(hal, settings);
    if let Err(err) = ui::summary::print_preflight(out, &checks) {
        log::warn!("Failed to print preflight results: {}", err);
    }
    match preflight::ensure_ready(hal, settings) {
        Ok(_) => 0,
        Err(err) => {
            log::error!("Preflight failed: {:#}", err);
            exit_code(&err)
        }
    }
}

/// Run the hardening pipeline, write the report and print the summary.
pub fn run_with<H: SystemHal>(
    hal: &H,
    settings: &Settings,
    prompter: &mut dyn Prompter,
    options: &HardeningOptions,
    out: &mut dyn Write,
) -> i32 {
    let run = run_hardening(hal, settings, prompter, options);

    if let Some(path) = &settings.report_path {
        match run.report.write_to(path) {
            Ok(()) => log::info!("Run report written to {}", path.display()),
            Err(err) => log::error!("Failed to write run report {}: {:#}", path.display(), err),
        }
    }
    if let Err(err) = ui::summary::print_report(out, &run.report) {
        log::warn!("Failed to print summary: {}", err);
    }

    match run.result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", with(emoji::ERROR, &format!("{:#}", err)));
            exit_code(&err)
        }
    }
}
