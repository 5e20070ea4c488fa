//! Terminal front-end adapter.
//!
//! Renders the device registry as console output and replays user intent
//! collected by the stdin command reader. Because the orchestrator's prompts
//! are synchronous and stdin belongs to the reader thread, mount parameters
//! and the unmount confirmation are seeded into [`PromptSeed`] by the command
//! parser before the toggle request is queued, and consumed when the
//! orchestrator asks for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use traymount_core::{DeviceHandle, FrontEnd, Section};

/// Answers for the next toggle's prompts, seeded by the command reader.
#[derive(Debug, Default)]
pub struct PromptSeed {
    pub fs_type: Option<String>,
    pub mount_point: Option<String>,
    pub confirm_unmount: bool,
}

#[derive(Debug)]
struct Item {
    node_path: String,
    label: String,
    section: Section,
    enabled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: u64,
    items: HashMap<DeviceHandle, Item>,
    seed: PromptSeed,
}

/// Console implementation of the front-end boundary.
///
/// Cloneable; the stdin reader holds a clone for seeding prompts and
/// printing the device list.
#[derive(Debug, Clone, Default)]
pub struct TerminalFrontEnd(Arc<Mutex<Inner>>);

impl TerminalFrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the prompt answers for the next toggle request.
    pub fn seed_prompts(&self, seed: PromptSeed) {
        self.0.lock().unwrap().seed = seed;
    }

    /// Prints the current device list, grouped by section.
    pub fn print_devices(&self) {
        let inner = self.0.lock().unwrap();
        if inner.items.is_empty() {
            println!("no devices");
            return;
        }
        for section in [Section::Mounted, Section::Unmounted] {
            let mut items: Vec<_> = inner
                .items
                .values()
                .filter(|item| item.section == section)
                .collect();
            items.sort_by(|a, b| a.node_path.cmp(&b.node_path));
            for item in items {
                let marker = if item.enabled { " " } else { "*" };
                println!("{} {}", marker, item.label);
            }
        }
    }
}

impl FrontEnd for TerminalFrontEnd {
    fn present_device(&mut self, node_path: &str, label: &str) -> DeviceHandle {
        let mut inner = self.0.lock().unwrap();
        inner.next_handle += 1;
        let handle = DeviceHandle(inner.next_handle);
        inner.items.insert(
            handle,
            Item {
                node_path: node_path.to_string(),
                label: label.to_string(),
                section: Section::Unmounted,
                enabled: true,
            },
        );
        println!("attached: {}", label);
        handle
    }

    fn remove_device(&mut self, handle: DeviceHandle) {
        if let Some(item) = self.0.lock().unwrap().items.remove(&handle) {
            println!("detached: {}", item.node_path);
        }
    }

    fn set_enabled(&mut self, handle: DeviceHandle, enabled: bool) {
        if let Some(item) = self.0.lock().unwrap().items.get_mut(&handle) {
            item.enabled = enabled;
        }
    }

    fn relabel(&mut self, handle: DeviceHandle, label: &str) {
        if let Some(item) = self.0.lock().unwrap().items.get_mut(&handle) {
            item.label = label.to_string();
        }
    }

    fn reposition(&mut self, handle: DeviceHandle, section: Section) {
        if let Some(item) = self.0.lock().unwrap().items.get_mut(&handle) {
            item.section = section;
        }
    }

    fn prompt_filesystem_type(&mut self, _node_path: &str, suggested: &str) -> Option<String> {
        let mut inner = self.0.lock().unwrap();
        Some(
            inner
                .seed
                .fs_type
                .take()
                .unwrap_or_else(|| suggested.to_string()),
        )
    }

    fn prompt_mount_point(&mut self, node_path: &str) -> Option<String> {
        let mut inner = self.0.lock().unwrap();
        let answer = inner.seed.mount_point.take();
        if answer.is_none() {
            println!(
                "no mount point given for {}; use: mount <node> [fstype] <dir>",
                node_path
            );
        }
        answer
    }

    fn confirm_unmount(&mut self, node_path: &str) -> bool {
        let mut inner = self.0.lock().unwrap();
        let confirmed = inner.seed.confirm_unmount;
        inner.seed.confirm_unmount = false;
        if !confirmed {
            println!("use: umount {} to unmount", node_path);
        }
        confirmed
    }

    fn notify_success(&mut self, message: &str) {
        println!("{}", message);
    }

    fn notify_failure(&mut self, message: &str) {
        println!("{}", message);
    }
}
