//! Mount verification against the live kernel mount table.
//!
//! After a mount or unmount utility runs, the orchestrator does not trust its
//! exit status; it asks this module whether the (device, mount point) pair is
//! actually present in `/proc/mounts`. Comparison is an exact string match on
//! the unescaped fields. Callers must supply canonical paths.

use std::fs;
use std::path::PathBuf;

/// Read-only view of the system mount table.
pub trait MountTable {
    /// Returns true iff an entry exists whose source device equals
    /// `node_path` and whose target equals `mount_point` exactly.
    fn is_mounted_at(&self, node_path: &str, mount_point: &str) -> bool;
}

/// Mount table backed by a procfs mounts file.
#[derive(Debug, Clone)]
pub struct ProcMounts {
    path: PathBuf,
}

impl ProcMounts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new("/proc/mounts")
    }
}

impl MountTable for ProcMounts {
    fn is_mounted_at(&self, node_path: &str, mount_point: &str) -> bool {
        // An unreadable table cannot confirm anything.
        let Ok(table) = fs::read_to_string(&self.path) else {
            return false;
        };
        table_contains(&table, node_path, mount_point)
    }
}

/// Scans mounts-file content for an exact (source, target) pair.
fn table_contains(table: &str, node_path: &str, mount_point: &str) -> bool {
    table.lines().any(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(source), Some(target)) => {
                unescape_mount_field(source) == node_path
                    && unescape_mount_field(target) == mount_point
            }
            _ => false,
        }
    })
}

/// Undoes the `\040`-style octal escapes the kernel emits for whitespace and
/// backslashes in mount fields.
fn unescape_mount_field(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num as char);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index] as char);
        index += 1;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_MOUNTS: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/sdb1 /media/My\\040USB vfat rw,nosuid 0 0
tmpfs /tmp tmpfs rw 0 0
";

    #[test]
    fn test_table_contains_exact_match() {
        assert!(table_contains(SAMPLE_MOUNTS, "/dev/nvme0n1p2", "/"));
        assert!(!table_contains(SAMPLE_MOUNTS, "/dev/nvme0n1p2", "/home"));
        assert!(!table_contains(SAMPLE_MOUNTS, "/dev/nvme0n1", "/"));
    }

    #[test]
    fn test_table_contains_unescapes_spaces() {
        assert!(table_contains(SAMPLE_MOUNTS, "/dev/sdb1", "/media/My USB"));
        assert!(!table_contains(
            SAMPLE_MOUNTS,
            "/dev/sdb1",
            "/media/My\\040USB"
        ));
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("/media/My\\040USB"), "/media/My USB");
        assert_eq!(unescape_mount_field("/dev/sdb1"), "/dev/sdb1");
        assert_eq!(unescape_mount_field("a\\134b"), "a\\b");
    }

    #[test]
    fn test_proc_mounts_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_MOUNTS.as_bytes()).unwrap();

        let table = ProcMounts::new(file.path());
        assert!(table.is_mounted_at("/dev/sdb1", "/media/My USB"));
        assert!(!table.is_mounted_at("/dev/sdb1", "/media/other"));
    }

    #[test]
    fn test_proc_mounts_missing_file_reports_unmounted() {
        let table = ProcMounts::new("/nonexistent/mounts");
        assert!(!table.is_mounted_at("/dev/sdb1", "/media/usb"));
    }
}
