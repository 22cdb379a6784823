//! Sweep a configuration tree for password authentication left switched on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::config_file::{is_backup_artifact, ConfigError, ConfigMutator};

static INSECURE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*PasswordAuthentication\s+)yes\b(.*)$").expect("valid regex"));

/// Rewrite `PasswordAuthentication yes` to `no` in a single file's content.
/// Returns `None` when nothing matched. Line endings are kept byte-for-byte.
pub fn rewrite_insecure(content: &str) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix('\n') {
            Some(body) => match body.strip_suffix('\r') {
                Some(body) => (body, "\r\n"),
                None => (body, "\n"),
            },
            None => (line, ""),
        };
        if INSECURE_LINE.is_match(body) {
            out.push_str(&INSECURE_LINE.replace(body, "${1}no${2}"));
            changed = true;
        } else {
            out.push_str(body);
        }
        out.push_str(ending);
    }
    changed.then_some(out)
}

/// Walk `root` and fix every regular file enabling password authentication.
/// Returns the files that were rewritten.
pub fn find_and_fix_insecure(root: &Path, mutator: &ConfigMutator) -> anyhow::Result<Vec<PathBuf>> {
    if !root.exists() {
        log::warn!("Scan root {} does not exist, nothing to scan", root.display());
        return Ok(Vec::new());
    }

    let mut changed = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || is_backup_artifact(entry.path()) {
            continue;
        }
        let path = entry.path();
        let content = match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    log::debug!("Skipping non-text file {}", path.display());
                    continue;
                }
            },
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                log::warn!("Cannot read {}: {}", path.display(), err);
                continue;
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    action: "read",
                    path: path.to_path_buf(),
                    source,
                }
                .into())
            }
        };

        if let Some(fixed) = rewrite_insecure(&content) {
            mutator.backup(path)?;
            mutator.write(path, &fixed)?;
            log::warn!("Disabled password authentication in {}", path.display());
            changed.push(path.to_path_buf());
        }
    }
    Ok(changed)
}
