//! Unified error types for the traymount-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.

use snafu::Snafu;
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Privilege elevation was refused or dismissed by the user.
    #[snafu(display("privilege elevation denied for '{program}'"))]
    ElevationDenied { program: String },

    /// The elevation wrapper or the command itself could not be started.
    #[snafu(display("failed to launch '{program}'"))]
    ProcessLaunch {
        program: String,
        source: std::io::Error,
    },

    /// The utility reported success but the mount table disagrees.
    #[snafu(display(
        "mount table does not confirm {node_path} at {mount_point}"
    ))]
    VerificationMismatch {
        node_path: String,
        mount_point: String,
    },

    /// A mount/unmount request does not match the device's current state.
    #[snafu(display("invalid transition for {node_path}: {reason}"))]
    InvalidTransition { node_path: String, reason: String },

    /// A request named a device that is not in the registry.
    #[snafu(display("unknown device {node_path}"))]
    UnknownDevice { node_path: String },

    /// The disk watcher could not establish its platform session.
    #[snafu(display("disk watcher session failed: {message}"))]
    WatcherSession { message: String },

    /// Failed to run the block-device enumeration command.
    #[snafu(display("failed to enumerate block devices"))]
    Enumerate { source: std::io::Error },

    /// Enumeration command ran but produced unusable output.
    #[snafu(display("failed to parse block device listing: {message}"))]
    EnumerateParse { message: String },

    /// Config file not found or cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write config file.
    #[snafu(display("failed to write config at {}", path.display()))]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse config file.
    #[snafu(display("failed to parse config: {message}"))]
    ConfigParse { message: String },

    /// Per-user config directory could not be determined.
    #[snafu(display("could not determine config directory"))]
    ConfigDirNotFound,
}
