//! traymount-core: Core library for removable-volume mounting.
//!
//! This library tracks removable storage volumes as they attach to and
//! detach from the host, keeps a registry of their mount state, and performs
//! privileged mount/unmount operations on user request, confirming every
//! outcome against the live mount table.
//!
//! # Modules
//!
//! - [`disk`]: Block-device enumeration using `lsblk`
//! - [`watcher`]: Background attach/detach watching
//! - [`orchestrator`]: Device registry and mount orchestration
//! - [`executor`]: Privileged command execution
//! - [`mount_table`]: Mount verification against the kernel mount table
//! - [`frontend`]: Front-end adapter boundary
//! - [`config`]: Tool configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! use traymount_core::{
//!     Config, DiskWatcher, LsblkEnumerator, MountOrchestrator, PrivilegedExecutor, ProcMounts,
//! };
//! # struct NullFrontEnd;
//! # impl traymount_core::FrontEnd for NullFrontEnd {
//! #     fn present_device(&mut self, _: &str, _: &str) -> traymount_core::DeviceHandle {
//! #         traymount_core::DeviceHandle(0)
//! #     }
//! #     fn remove_device(&mut self, _: traymount_core::DeviceHandle) {}
//! #     fn set_enabled(&mut self, _: traymount_core::DeviceHandle, _: bool) {}
//! #     fn relabel(&mut self, _: traymount_core::DeviceHandle, _: &str) {}
//! #     fn reposition(&mut self, _: traymount_core::DeviceHandle, _: traymount_core::Section) {}
//! #     fn prompt_filesystem_type(&mut self, _: &str, _: &str) -> Option<String> { None }
//! #     fn prompt_mount_point(&mut self, _: &str) -> Option<String> { None }
//! #     fn confirm_unmount(&mut self, _: &str) -> bool { false }
//! #     fn notify_success(&mut self, _: &str) {}
//! #     fn notify_failure(&mut self, _: &str) {}
//! # }
//!
//! let config = Config::default();
//! let (queue_tx, queue_rx) = mpsc::channel();
//!
//! // The watcher feeds attach/detach events from its own thread.
//! let watcher = DiskWatcher::new(
//!     LsblkEnumerator,
//!     Duration::from_millis(config.poll_interval_ms),
//! );
//! let handle = watcher.handle();
//! let watcher_tx = queue_tx.clone();
//! let watcher_thread = std::thread::spawn(move || watcher.run(watcher_tx));
//!
//! // The orchestrator processes everything on this thread.
//! let mut orchestrator = MountOrchestrator::new(
//!     Box::new(PrivilegedExecutor::new(config.escalation)),
//!     Box::new(ProcMounts::default()),
//!     NullFrontEnd,
//!     config,
//! );
//! orchestrator.run(queue_rx);
//!
//! // Shutdown: stop the watcher and join its thread.
//! handle.stop();
//! watcher_thread.join().unwrap().unwrap();
//! ```

pub mod config;
pub mod disk;
pub mod error;
pub mod executor;
pub mod frontend;
pub mod mount_table;
pub mod orchestrator;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use disk::{DeviceEnumerator, DiskDevice, LsblkEnumerator};
pub use error::{Error, Result};
pub use executor::{CommandExecutor, PrivilegeEscalation, PrivilegedExecutor};
pub use frontend::{DeviceHandle, FrontEnd, Section};
pub use mount_table::{MountTable, ProcMounts};
pub use orchestrator::{MountOrchestrator, MountState, OrchestratorCommand};
pub use watcher::{DiskWatcher, WatcherHandle};
