use std::fs;

use bulwark_core::prompt::{Answer, ScriptedPrompter};
use bulwark_core::{HardeningOptions, Settings};
use bulwark_hal::{CommandReply, FakeHal};
use bulwark_installer::{run_preflight, run_with};
use tempfile::{tempdir, TempDir};

const KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHq2mF3oN0hX1b2cNqzS7f9gYvWkq8yYq3Vt1p0bZ6nL admin@laptop";

fn sandbox() -> (TempDir, Settings) {
    let tmp = tempdir().unwrap();
    let ssh_dir = tmp.path().join("etc/ssh");
    fs::create_dir_all(&ssh_dir).unwrap();
    fs::write(ssh_dir.join("sshd_config"), "PermitRootLogin yes\nUsePAM yes\n").unwrap();

    let mut settings = Settings {
        sshd_config: ssh_dir.join("sshd_config"),
        scan_root: ssh_dir,
        home_root: tmp.path().join("home"),
        log_file: tmp.path().join("audit.log"),
        report_path: Some(tmp.path().join("reports/run.json")),
        ..Settings::default()
    };
    settings.ban.jail_path = tmp.path().join("jail.local");
    settings.packages.skip = true;
    (tmp, settings)
}

fn hal() -> FakeHal {
    let hal = FakeHal::new();
    hal.on_command(
        "ss",
        CommandReply::success("LISTEN 0 128 0.0.0.0:22 0.0.0.0:* users:((\"sshd\",pid=1,fd=3))\n"),
    );
    hal.on_command_args(
        "systemctl",
        &["list-unit-files"],
        CommandReply::success("sshd.service enabled enabled\n"),
    );
    hal
}

fn stamped() -> HardeningOptions {
    HardeningOptions {
        assume_yes: true,
        backup_stamp: Some("20260301090000".to_string()),
    }
}

#[test]
fn successful_run_writes_report_and_summary() {
    let (_tmp, settings) = sandbox();
    let hal = hal();
    let mut prompter = ScriptedPrompter::new([
        Answer::text("deploy"),
        Answer::text("s3cret-passphrase"),
        Answer::text("s3cret-passphrase"),
        Answer::text(KEY),
        Answer::text("40022"),
        Answer::Confirm(true),
    ]);
    let mut out = Vec::new();

    let status = run_with(&hal, &settings, &mut prompter, &stamped(), &mut out);
    assert_eq!(status, 0);

    let summary = String::from_utf8(out).unwrap();
    assert!(summary.contains("Hardening complete."));
    assert!(summary.contains("ssh -p 40022 deploy@<host>"));
    assert!(summary.contains("test a new login"));

    let report_path = settings.report_path.as_ref().unwrap();
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["ssh_port"], 40022);
    assert_eq!(report["username"], "deploy");
    assert_eq!(report["ssh_service"], "sshd.service");
    assert_eq!(report["https_allowed"], true);
    assert_eq!(report["progress"]["outcome"]["state"], "done");

    let lines = hal.command_lines();
    assert!(lines.iter().any(|line| line == "ufw allow 443/tcp"));
    assert!(!lines.iter().any(|line| line.starts_with("apt-get")));
}

#[test]
fn declined_consent_exits_with_two() {
    let (_tmp, settings) = sandbox();
    let hal = hal();
    let mut prompter = ScriptedPrompter::new([Answer::Confirm(false)]);
    let mut out = Vec::new();

    let status = run_with(
        &hal,
        &settings,
        &mut prompter,
        &HardeningOptions::default(),
        &mut out,
    );

    assert_eq!(status, 2);
    assert_eq!(hal.operation_count(), 0);
    let summary = String::from_utf8(out).unwrap();
    assert!(summary.contains("Hardening aborted at 'start'"));
    assert!(settings.report_path.as_ref().unwrap().exists());
}

#[test]
fn failing_restart_propagates_command_exit_code() {
    let (_tmp, settings) = sandbox();
    let hal = hal();
    hal.on_command_args("systemctl", &["restart"], CommandReply::failure(5, "Unit not loaded"));
    let mut prompter = ScriptedPrompter::new([
        Answer::text("deploy"),
        Answer::text("s3cret-passphrase"),
        Answer::text("s3cret-passphrase"),
        Answer::text(KEY),
        Answer::text(""),
        Answer::Confirm(false),
    ]);
    let mut out = Vec::new();

    let status = run_with(&hal, &settings, &mut prompter, &stamped(), &mut out);

    assert_eq!(status, 5);
    let summary = String::from_utf8(out).unwrap();
    assert!(summary.contains("aborted at 'ssh-hardened'"));
    assert!(!hal.command_lines().iter().any(|line| line.starts_with("ufw")));
}

#[test]
fn preflight_reports_missing_tools() {
    let (_tmp, settings) = sandbox();
    let hal = hal();
    let mut out = Vec::new();
    assert_eq!(run_preflight(&hal, &settings, &mut out), 0);
    assert!(String::from_utf8(out).unwrap().contains("Preflight checks"));

    hal.remove_executable("useradd");
    let mut out = Vec::new();
    assert_eq!(run_preflight(&hal, &settings, &mut out), 1);
    assert!(String::from_utf8(out).unwrap().contains("❌"));
    assert_eq!(hal.operation_count(), 0);
}
