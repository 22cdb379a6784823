//! Audit log setup.
//!
//! The audit log is the only persisted record of a run: append-only, one
//! timestamped, leveled line per event.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn init_with(log_file: &Path) {
    use env_logger::Target;

    // Prefer the append-only audit file. If we cannot create it (permissions,
    // readonly FS, etc.), fall back to stderr.
    let target = (|| -> io::Result<Target> {
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        Ok(Target::Pipe(Box::new(file)))
    })()
    .unwrap_or(Target::Stderr);

    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
