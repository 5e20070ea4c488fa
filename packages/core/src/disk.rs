//! Block-device enumeration using lsblk.
//!
//! This module provides the snapshot side of disk discovery: one `lsblk`
//! invocation describes every block device currently attached, and the
//! partition filter keeps only the leaf volumes a user can actually mount.
//! Whole disks and container devices never surface.

use std::process::Command;

use serde::Deserialize;

use crate::error::{Error, Result};

/// A mountable partition visible on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDevice {
    /// Device node path (e.g., "/dev/sda1"). Stable while the device is
    /// attached; used as the registry key.
    pub node_path: String,
    /// Capacity in bytes, as reported at scan time.
    pub size_bytes: u64,
}

/// Source of block-device snapshots.
///
/// The production implementation shells out to `lsblk`; tests substitute a
/// scripted enumerator.
pub trait DeviceEnumerator {
    /// Returns every mountable partition currently attached.
    fn enumerate(&self) -> Result<Vec<DiskDevice>>;
}

/// Raw JSON structure from lsblk output.
#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(rename = "type")]
    device_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    children: Option<Vec<LsblkDevice>>,
}

/// Enumerator backed by `lsblk --json --bytes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsblkEnumerator;

impl DeviceEnumerator for LsblkEnumerator {
    fn enumerate(&self) -> Result<Vec<DiskDevice>> {
        let output = Command::new("lsblk")
            .args(["--json", "--bytes", "--output", "NAME,TYPE,SIZE"])
            .output()
            .map_err(|e| Error::Enumerate { source: e })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::EnumerateParse {
                message: format!(
                    "lsblk exited with code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let listing: LsblkOutput =
            serde_json::from_str(&stdout).map_err(|e| Error::EnumerateParse {
                message: e.to_string(),
            })?;

        let mut devices = Vec::new();
        collect_partitions(&listing.blockdevices, &mut devices);

        Ok(devices)
    }
}

/// Recursively collect partitions from lsblk output.
///
/// Only entries with `type == "part"` survive; a partition whose size cannot
/// be read is treated as not mountable and skipped.
fn collect_partitions(listing: &[LsblkDevice], devices: &mut Vec<DiskDevice>) {
    for dev in listing {
        if dev.device_type.as_deref() == Some("part") {
            if let Some(size) = dev.size {
                devices.push(DiskDevice {
                    node_path: format!("/dev/{}", dev.name),
                    size_bytes: size,
                });
            }
        }

        if let Some(children) = &dev.children {
            collect_partitions(children, devices);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LSBLK_JSON: &str = r#"{
        "blockdevices": [
            {
                "name": "nvme0n1",
                "type": "disk",
                "size": 500107862016,
                "children": [
                    {
                        "name": "nvme0n1p1",
                        "type": "part",
                        "size": 536870912
                    },
                    {
                        "name": "nvme0n1p2",
                        "type": "part",
                        "size": 499570991104
                    }
                ]
            },
            {
                "name": "sdb",
                "type": "disk",
                "size": 16008609792,
                "children": [
                    {
                        "name": "sdb1",
                        "type": "part",
                        "size": 16000000000
                    }
                ]
            },
            {
                "name": "sr0",
                "type": "rom",
                "size": 1073741312
            }
        ]
    }"#;

    #[test]
    fn test_collect_partitions_filters_non_partitions() {
        let listing: LsblkOutput = serde_json::from_str(SAMPLE_LSBLK_JSON).unwrap();
        let mut devices = Vec::new();
        collect_partitions(&listing.blockdevices, &mut devices);

        assert_eq!(devices.len(), 3);
        assert!(devices.iter().all(|d| d.node_path.starts_with("/dev/")));
        // Whole disks and the rom device are filtered out.
        assert!(!devices.iter().any(|d| d.node_path == "/dev/nvme0n1"));
        assert!(!devices.iter().any(|d| d.node_path == "/dev/sr0"));

        let usb = devices.iter().find(|d| d.node_path == "/dev/sdb1").unwrap();
        assert_eq!(usb.size_bytes, 16_000_000_000);
    }

    #[test]
    fn test_collect_partitions_skips_unreadable_size() {
        let json = r#"{
            "blockdevices": [
                {
                    "name": "sda",
                    "type": "disk",
                    "children": [
                        { "name": "sda1", "type": "part" },
                        { "name": "sda2", "type": "part", "size": 1024 }
                    ]
                }
            ]
        }"#;

        let listing: LsblkOutput = serde_json::from_str(json).unwrap();
        let mut devices = Vec::new();
        collect_partitions(&listing.blockdevices, &mut devices);

        assert_eq!(
            devices,
            vec![DiskDevice {
                node_path: "/dev/sda2".to_string(),
                size_bytes: 1024,
            }]
        );
    }
}
