//! Tool configuration.
//!
//! A small JSON config controls which utilities are invoked, how privileges
//! are escalated, how often the watcher polls, and the filesystem type
//! suggested in the mount prompt. A missing file yields defaults; a malformed
//! file is an error so typos do not silently fall back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::executor::PrivilegeEscalation;

/// Default mount utility path.
pub const MOUNT_PROGRAM: &str = "/sbin/mount";

/// Default unmount utility path.
pub const UMOUNT_PROGRAM: &str = "/sbin/umount";

/// Tool configuration, persisted as JSON under the user config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the mount utility.
    pub mount_program: String,
    /// Path of the unmount utility.
    pub umount_program: String,
    /// How privileged commands acquire root.
    pub escalation: PrivilegeEscalation,
    /// Disk watcher poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Filesystem type pre-filled in the mount prompt.
    pub default_filesystem_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_program: MOUNT_PROGRAM.to_string(),
            umount_program: UMOUNT_PROGRAM.to_string(),
            escalation: PrivilegeEscalation::default(),
            poll_interval_ms: 1000,
            default_filesystem_type: "msdos".to_string(),
        }
    }
}

impl Config {
    /// Loads config from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Writes config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::ConfigWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).expect("config serialization cannot fail");
        fs::write(path, content).map_err(|e| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Returns the per-user config file path.
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or(Error::ConfigDirNotFound)?;
    Ok(dir.join("traymount").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traymount").join("config.json");

        let config = Config {
            mount_program: "/usr/bin/mount".to_string(),
            escalation: PrivilegeEscalation::Sudo,
            poll_interval_ms: 250,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "escalation": "sudo" }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.escalation, PrivilegeEscalation::Sudo);
        assert_eq!(config.mount_program, MOUNT_PROGRAM);
        assert_eq!(config.default_filesystem_type, "msdos");
    }
}
