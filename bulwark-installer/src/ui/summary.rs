//! End-of-run console output.

use std::io::{self, Write};

use bulwark_core::preflight::PreflightCheck;
use bulwark_core::report::RunReport;

use super::style::{emoji, with};

pub fn print_report(out: &mut dyn Write, report: &RunReport) -> io::Result<()> {
    let lines = report.summary_lines();
    let Some((headline, details)) = lines.split_first() else {
        return Ok(());
    };
    let mark = if report.succeeded() { emoji::PARTY } else { emoji::CANCEL };
    writeln!(out)?;
    writeln!(out, "{}", with(mark, headline))?;
    for line in details {
        writeln!(out, "   {}", line)?;
    }
    if report.succeeded() {
        writeln!(
            out,
            "{}",
            with(
                emoji::WARN,
                "Keep this session open and test a new login before disconnecting."
            )
        )?;
    }
    Ok(())
}

pub fn print_preflight(out: &mut dyn Write, checks: &[PreflightCheck]) -> io::Result<()> {
    writeln!(out, "{}", with(emoji::SEARCH, "Preflight checks"))?;
    for check in checks {
        let mark = if check.ok { emoji::SUCCESS } else { emoji::ERROR };
        writeln!(out, "   {} {:<18} {}", mark, check.name, check.detail)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_run_has_no_login_hint() {
        let mut report = RunReport::new();
        report.progress.mark_aborted("privilege-check", "must run as root");
        let mut out = Vec::new();
        print_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("aborted at 'privilege-check'"));
        assert!(!text.contains("test a new login"));
    }

    #[test]
    fn preflight_marks_failures() {
        let checks = vec![
            PreflightCheck {
                name: "root".to_string(),
                ok: false,
                detail: "not running as root".to_string(),
            },
            PreflightCheck {
                name: "sshd".to_string(),
                ok: true,
                detail: "/usr/sbin/sshd".to_string(),
            },
        ];
        let mut out = Vec::new();
        print_preflight(&mut out, &checks).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("❌ root"));
        assert!(text.contains("✅ sshd"));
    }
}
