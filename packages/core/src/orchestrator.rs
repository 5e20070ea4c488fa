//! Device registry and mount orchestration.
//!
//! This is the heart of the tool: a single-threaded dispatch loop that owns
//! the registry of attached devices, reacts to watcher events and user toggle
//! requests, runs the privileged mount utilities, and commits state only
//! after the mount table confirms the outcome.
//!
//! All registry mutation happens on the thread running
//! [`MountOrchestrator::run`]. The watcher and the front-end glue communicate
//! exclusively through the command queue, so no locking is needed here.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::frontend::{DeviceHandle, FrontEnd, Section};
use crate::mount_table::MountTable;

/// Commands consumed by the orchestrator's dispatch loop.
///
/// Watcher events and front-end intent arrive through the same queue; the
/// loop is the only consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorCommand {
    /// A mountable partition attached.
    DiskAppeared { node_path: String, size_bytes: u64 },
    /// A previously appeared partition detached.
    DiskDisappeared { node_path: String },
    /// The user activated a device item.
    ToggleRequested { node_path: String },
    /// Terminate the dispatch loop.
    Shutdown,
}

/// Mount state of a registered device.
///
/// The mount point lives inside the `Mounted` variant, so a record cannot
/// carry a stale path while unmounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted { mount_point: String },
}

/// Registry entry for one attached device.
#[derive(Debug)]
struct DeviceRecord {
    node_path: String,
    size_bytes: u64,
    state: MountState,
    /// Gate preventing a second operation while one is outstanding.
    /// Set and cleared only by the dispatch thread.
    op_in_flight: bool,
    handle: DeviceHandle,
}

impl DeviceRecord {
    fn base_label(&self) -> String {
        disk_label(&self.node_path, self.size_bytes)
    }
}

/// Human label for a device item: node path plus capacity in whole GiB.
fn disk_label(node_path: &str, size_bytes: u64) -> String {
    format!("{} ({} GiB)", node_path, size_bytes / (1024 * 1024 * 1024))
}

/// Outcome of a mount or unmount attempt, produced by the executor/verifier
/// pair and applied by the commit step.
enum OpOutcome {
    Confirmed,
    Failed(Error),
}

/// Owns the device registry and drives mount/unmount operations.
pub struct MountOrchestrator<F: FrontEnd> {
    devices: HashMap<String, DeviceRecord>,
    executor: Box<dyn CommandExecutor>,
    mount_table: Box<dyn MountTable>,
    frontend: F,
    config: Config,
}

impl<F: FrontEnd> MountOrchestrator<F> {
    pub fn new(
        executor: Box<dyn CommandExecutor>,
        mount_table: Box<dyn MountTable>,
        frontend: F,
        config: Config,
    ) -> Self {
        Self {
            devices: HashMap::new(),
            executor,
            mount_table,
            frontend,
            config,
        }
    }

    /// Runs the dispatch loop until `Shutdown` or queue disconnect.
    pub fn run(&mut self, queue: Receiver<OrchestratorCommand>) {
        while let Ok(command) = queue.recv() {
            debug!(?command, "dispatch");
            match command {
                OrchestratorCommand::DiskAppeared {
                    node_path,
                    size_bytes,
                } => self.on_appeared(&node_path, size_bytes),
                OrchestratorCommand::DiskDisappeared { node_path } => {
                    self.on_disappeared(&node_path)
                }
                OrchestratorCommand::ToggleRequested { node_path } => self.on_toggle(&node_path),
                OrchestratorCommand::Shutdown => break,
            }
        }
    }

    /// Registers a newly attached device. Idempotent against duplicates.
    pub fn on_appeared(&mut self, node_path: &str, size_bytes: u64) {
        if self.devices.contains_key(node_path) {
            debug!(node_path, "already registered, ignoring");
            return;
        }

        let label = disk_label(node_path, size_bytes);
        let handle = self.frontend.present_device(node_path, &label);
        self.devices.insert(
            node_path.to_string(),
            DeviceRecord {
                node_path: node_path.to_string(),
                size_bytes,
                state: MountState::Unmounted,
                op_in_flight: false,
                handle,
            },
        );
        info!(node_path, size_bytes, "device attached");
    }

    /// Removes a detached device and releases its presentation.
    ///
    /// An operation still in flight for the record is abandoned; its
    /// completion will find no record and do nothing.
    pub fn on_disappeared(&mut self, node_path: &str) {
        let Some(record) = self.devices.remove(node_path) else {
            debug!(node_path, "not registered, ignoring");
            return;
        };

        if record.op_in_flight {
            warn!(node_path, "device detached with an operation in flight");
        }

        self.frontend.remove_device(record.handle);
        info!(node_path, "device detached");
    }

    /// Handles a user activation of a device item.
    ///
    /// Collects the mount parameters (or the unmount confirmation) from the
    /// front end, then delegates to the corresponding request. A cancelled
    /// prompt aborts before any state is touched.
    pub fn on_toggle(&mut self, node_path: &str) {
        let Some(record) = self.devices.get(node_path) else {
            debug!(node_path, "toggle for unknown device, ignoring");
            return;
        };
        if record.op_in_flight {
            debug!(node_path, "operation in flight, ignoring toggle");
            return;
        }

        match record.state.clone() {
            MountState::Mounted { mount_point } => {
                if !self.frontend.confirm_unmount(node_path) {
                    debug!(node_path, "unmount not confirmed");
                    return;
                }
                if let Err(e) = self.request_unmount(node_path) {
                    warn!(node_path, %mount_point, error = %e, "unmount request rejected");
                }
            }
            MountState::Unmounted => {
                let suggested = self.config.default_filesystem_type.clone();
                let Some(fs_type) = self.frontend.prompt_filesystem_type(node_path, &suggested)
                else {
                    debug!(node_path, "filesystem type prompt cancelled");
                    return;
                };
                let Some(mount_point) = self.frontend.prompt_mount_point(node_path) else {
                    debug!(node_path, "mount point prompt cancelled");
                    return;
                };
                if let Err(e) = self.request_mount(node_path, &fs_type, &mount_point) {
                    warn!(node_path, %mount_point, error = %e, "mount request rejected");
                }
            }
        }
    }

    /// Mounts a registered, unmounted device at `mount_point`.
    ///
    /// Invokes the mount utility with elevated privileges, then commits the
    /// state only if the mount table confirms the new entry. The in-flight
    /// gate is cleared on every exit path.
    pub fn request_mount(
        &mut self,
        node_path: &str,
        fs_type: &str,
        mount_point: &str,
    ) -> Result<()> {
        self.begin_operation(node_path, false)?;

        let args = vec![
            "-t".to_string(),
            fs_type.to_string(),
            node_path.to_string(),
            mount_point.to_string(),
        ];
        let outcome = match self.executor.execute(&self.config.mount_program, &args) {
            Ok(()) => {
                if self.mount_table.is_mounted_at(node_path, mount_point) {
                    OpOutcome::Confirmed
                } else {
                    OpOutcome::Failed(Error::VerificationMismatch {
                        node_path: node_path.to_string(),
                        mount_point: mount_point.to_string(),
                    })
                }
            }
            Err(e) => OpOutcome::Failed(e),
        };

        self.settle_mount(node_path, mount_point, outcome);
        Ok(())
    }

    /// Unmounts a registered, mounted device from its own mount point.
    pub fn request_unmount(&mut self, node_path: &str) -> Result<()> {
        let mount_point = self.begin_operation(node_path, true)?;

        let args = vec![mount_point.clone()];
        let outcome = match self.executor.execute(&self.config.umount_program, &args) {
            Ok(()) => {
                if self.mount_table.is_mounted_at(node_path, &mount_point) {
                    OpOutcome::Failed(Error::VerificationMismatch {
                        node_path: node_path.to_string(),
                        mount_point: mount_point.clone(),
                    })
                } else {
                    OpOutcome::Confirmed
                }
            }
            Err(e) => OpOutcome::Failed(e),
        };

        self.settle_unmount(node_path, &mount_point, outcome);
        Ok(())
    }

    /// Validates a request against the state machine and takes the in-flight
    /// gate, mirroring it to the presentation as a disabled item.
    ///
    /// Returns the record's mount point for unmount requests, or an empty
    /// string for mount requests.
    fn begin_operation(&mut self, node_path: &str, expect_mounted: bool) -> Result<String> {
        let record = self
            .devices
            .get_mut(node_path)
            .ok_or_else(|| Error::UnknownDevice {
                node_path: node_path.to_string(),
            })?;

        if record.op_in_flight {
            return Err(Error::InvalidTransition {
                node_path: node_path.to_string(),
                reason: "operation already in flight".to_string(),
            });
        }

        let mount_point = match (&record.state, expect_mounted) {
            (MountState::Unmounted, false) => String::new(),
            (MountState::Mounted { mount_point }, true) => mount_point.clone(),
            (MountState::Unmounted, true) => {
                return Err(Error::InvalidTransition {
                    node_path: node_path.to_string(),
                    reason: "not mounted".to_string(),
                });
            }
            (MountState::Mounted { .. }, false) => {
                return Err(Error::InvalidTransition {
                    node_path: node_path.to_string(),
                    reason: "already mounted".to_string(),
                });
            }
        };

        record.op_in_flight = true;
        let handle = record.handle;
        self.frontend.set_enabled(handle, false);
        Ok(mount_point)
    }

    /// Applies a mount outcome. Tolerates the record having been removed by
    /// a detach that raced the operation; the late completion is a no-op.
    fn settle_mount(&mut self, node_path: &str, mount_point: &str, outcome: OpOutcome) {
        let Some(record) = self.devices.get_mut(node_path) else {
            debug!(node_path, "mount completion for removed device, dropping");
            return;
        };
        record.op_in_flight = false;
        let handle = record.handle;

        match outcome {
            OpOutcome::Confirmed => {
                record.state = MountState::Mounted {
                    mount_point: mount_point.to_string(),
                };
                let label = format!("{} on {}", record.base_label(), mount_point);
                self.frontend.relabel(handle, &label);
                self.frontend.reposition(handle, Section::Mounted);
                self.frontend.set_enabled(handle, true);
                self.frontend.notify_success(&format!(
                    "{} successfully mounted on {}",
                    node_path, mount_point
                ));
                info!(node_path, mount_point, "mount committed");
            }
            OpOutcome::Failed(e) => {
                self.frontend.set_enabled(handle, true);
                self.frontend
                    .notify_failure(&format!("{} mount on {} failed", node_path, mount_point));
                warn!(node_path, mount_point, error = %e, "mount failed");
            }
        }
    }

    /// Applies an unmount outcome; same removal tolerance as
    /// [`Self::settle_mount`].
    fn settle_unmount(&mut self, node_path: &str, mount_point: &str, outcome: OpOutcome) {
        let Some(record) = self.devices.get_mut(node_path) else {
            debug!(node_path, "unmount completion for removed device, dropping");
            return;
        };
        record.op_in_flight = false;
        let handle = record.handle;

        match outcome {
            OpOutcome::Confirmed => {
                record.state = MountState::Unmounted;
                let label = record.base_label();
                self.frontend.relabel(handle, &label);
                self.frontend.reposition(handle, Section::Unmounted);
                self.frontend.set_enabled(handle, true);
                self.frontend.notify_success(&format!(
                    "{} successfully unmounted from {}",
                    node_path, mount_point
                ));
                info!(node_path, mount_point, "unmount committed");
            }
            OpOutcome::Failed(e) => {
                self.frontend.set_enabled(handle, true);
                self.frontend.notify_failure(&format!(
                    "{} unmount from {} failed",
                    node_path, mount_point
                ));
                warn!(node_path, mount_point, error = %e, "unmount failed");
            }
        }
    }

    /// Current mount state of a registered device.
    pub fn mount_state(&self, node_path: &str) -> Option<&MountState> {
        self.devices.get(node_path).map(|r| &r.state)
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
