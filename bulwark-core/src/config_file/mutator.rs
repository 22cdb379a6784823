use std::cell::RefCell;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::ConfigDocument;

/// `<path>.bak.<YYYYMMDDHHMMSS>`
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

static BACKUP_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.bak\.\d{14}$").expect("valid regex"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),
}

impl ConfigError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| ConfigError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak.");
    name.push(stamp);
    PathBuf::from(name)
}

/// Backups and our own temp files are never scanned or edited.
pub fn is_backup_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    BACKUP_SUFFIX.is_match(name) || name.ends_with(".bulwark.tmp")
}

/// Edits configuration files in place for one run.
///
/// Every backup taken by a mutator shares the run's timestamp, so each file
/// is backed up at most once per run and earlier backups are never replaced.
#[derive(Debug)]
pub struct ConfigMutator {
    stamp: String,
    backups: RefCell<Vec<PathBuf>>,
}

impl ConfigMutator {
    pub fn new() -> Self {
        Self::with_stamp(chrono::Local::now().format(BACKUP_STAMP_FORMAT).to_string())
    }

    pub fn with_stamp(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            backups: RefCell::new(Vec::new()),
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn backups(&self) -> Vec<PathBuf> {
        self.backups.borrow().clone()
    }

    /// Copy `path` to its run-scoped backup name. Returns `None` when `path`
    /// does not exist or this run already backed it up.
    pub fn backup(&self, path: &Path) -> ConfigResult<Option<PathBuf>> {
        if !path.is_file() {
            return Ok(None);
        }
        let target = backup_path(path, &self.stamp);
        if target.exists() {
            log::debug!("Backup {} already present, keeping it", target.display());
            return Ok(None);
        }
        fs::copy(path, &target).map_err(ConfigError::io("back up", path))?;
        log::info!("Backed up {} -> {}", path.display(), target.display());
        self.backups.borrow_mut().push(target.clone());
        Ok(Some(target))
    }

    /// Read `path`, creating it (and its parents) empty when absent.
    pub fn read_or_create(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(ConfigError::io("create directory for", path))?;
            }
            File::create(path).map_err(ConfigError::io("create", path))?;
            log::info!("Created empty {}", path.display());
            return Ok(String::new());
        }
        let bytes = fs::read(path).map_err(ConfigError::io("read", path))?;
        String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8(path.to_path_buf()))
    }

    /// Ensure `key value` is the single active directive for `key` in `path`.
    /// Returns whether the file content changed.
    pub fn upsert(&self, path: &Path, key: &str, value: &str) -> ConfigResult<bool> {
        self.edit(path, |doc| doc.upsert(key, value))
    }

    /// Keep only the last line carrying `key` in `path`.
    pub fn dedupe(&self, path: &Path, key: &str) -> ConfigResult<bool> {
        self.edit(path, |doc| {
            let removed = doc.retain_last(key);
            if removed > 0 {
                log::info!("Removed {} stale '{}' line(s) from {}", removed, key, path.display());
            }
        })
    }

    fn edit(&self, path: &Path, apply: impl FnOnce(&mut ConfigDocument)) -> ConfigResult<bool> {
        let existed = path.exists();
        let before = self.read_or_create(path)?;
        if existed {
            self.backup(path)?;
        }

        let mut doc = ConfigDocument::parse(&before);
        apply(&mut doc);
        let after = doc.to_string();
        if after == before {
            return Ok(false);
        }
        self.write(path, &after)?;
        Ok(true)
    }

    /// Replace the full content of `path`, backing up the previous version.
    pub fn replace(&self, path: &Path, content: &str) -> ConfigResult<bool> {
        let existed = path.exists();
        let before = self.read_or_create(path)?;
        if existed {
            self.backup(path)?;
        }
        if before == content {
            return Ok(false);
        }
        self.write(path, content)?;
        Ok(true)
    }

    /// Atomic replace: temp file, fsync, rename, fsync the directory.
    pub fn write(&self, path: &Path, content: &str) -> ConfigResult<()> {
        let tmp_path = temp_path(path);
        let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());

        let mut file = File::create(&tmp_path).map_err(ConfigError::io("create temp file for", path))?;
        file.write_all(content.as_bytes())
            .map_err(ConfigError::io("write", &tmp_path))?;
        file.sync_all().map_err(ConfigError::io("flush", &tmp_path))?;
        if let Some(permissions) = permissions {
            fs::set_permissions(&tmp_path, permissions)
                .map_err(ConfigError::io("set permissions on", &tmp_path))?;
        }

        fs::rename(&tmp_path, path).map_err(ConfigError::io("replace", path))?;

        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                dir.sync_all().ok();
            }
        }
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

impl Default for ConfigMutator {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bulwark.tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    const STAMP: &str = "20240102030405";

    #[test]
    fn backup_names_follow_the_stamp() {
        let path = Path::new("/etc/ssh/sshd_config");
        assert_eq!(
            backup_path(path, STAMP),
            PathBuf::from("/etc/ssh/sshd_config.bak.20240102030405")
        );
        assert!(is_backup_artifact(&backup_path(path, STAMP)));
        assert!(is_backup_artifact(&temp_path(path)));
        assert!(!is_backup_artifact(path));
        assert!(!is_backup_artifact(Path::new("/etc/ssh/sshd_config.bak")));
    }

    #[test]
    fn upsert_creates_missing_file_without_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/sshd_config");
        let mutator = ConfigMutator::with_stamp(STAMP);

        assert!(mutator.upsert(&path, "Port", "2222").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Port 2222\n");
        assert!(mutator.backups().is_empty());
    }

    #[test]
    fn upsert_is_a_fixed_point() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sshd_config");
        fs::write(&path, "#PermitRootLogin yes\nUsePAM no\n").unwrap();
        let mutator = ConfigMutator::with_stamp(STAMP);

        assert!(mutator.upsert(&path, "PermitRootLogin", "no").unwrap());
        let first = fs::read_to_string(&path).unwrap();
        assert!(!mutator.upsert(&path, "PermitRootLogin", "no").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
        assert_eq!(first, "PermitRootLogin no\nUsePAM no\n");

        let later = ConfigMutator::with_stamp("20240102030500");
        assert!(!later.upsert(&path, "PermitRootLogin", "no").unwrap());
        assert_eq!(later.backups().len(), 1);
    }

    #[test]
    fn first_backup_of_a_run_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sshd_config");
        fs::write(&path, "Port 22\n").unwrap();
        let mutator = ConfigMutator::with_stamp(STAMP);

        mutator.upsert(&path, "Port", "2222").unwrap();
        mutator.upsert(&path, "UsePAM", "yes").unwrap();

        let backup = backup_path(&path, STAMP);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "Port 22\n");
        assert_eq!(mutator.backups(), vec![backup]);
    }

    #[test]
    fn existing_backups_are_never_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jail.local");
        fs::write(&path, "current\n").unwrap();
        let backup = backup_path(&path, STAMP);
        fs::write(&backup, "older\n").unwrap();

        let mutator = ConfigMutator::with_stamp(STAMP);
        assert_eq!(mutator.backup(&path).unwrap(), None);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "older\n");
    }

    #[test]
    fn write_keeps_permissions_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sshd_config");
        fs::write(&path, "Port 22\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let mutator = ConfigMutator::with_stamp(STAMP);
        mutator.replace(&path, "Port 2200\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!temp_path(&path).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Port 2200\n");
    }

    #[test]
    fn dedupe_removes_earlier_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sshd_config");
        fs::write(&path, "Port 22\n#Port 2222\n").unwrap();
        let mutator = ConfigMutator::with_stamp(STAMP);

        assert!(mutator.dedupe(&path, "Port").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "#Port 2222\n");
    }
}
