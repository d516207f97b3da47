//! Disk count, per-disk manifest, and the machine-readable allocation report.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::core::units::format_size;
use crate::engine::record::{Allocation, Disk};

/// `1 disk.` / `3 disks.`
pub fn count_line(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} disk{plural}.")
}

/// `Disk #2, 40% (40B) free:`
pub fn disk_header(disk: &Disk) -> String {
    format!(
        "Disk #{}, {}% ({}) free:",
        disk.id(),
        disk.free_percent(),
        format_size(disk.free())
    )
}

/// Size right-aligned to ten columns, then the path.
pub fn file_line(size: u64, path: &std::path::Path) -> String {
    format!("{:>10} {}", format_size(size), path.display())
}

/// Write the manifest with undecorated headers.
pub fn write_manifest<W: Write>(out: &mut W, allocation: &Allocation) -> io::Result<()> {
    write_manifest_with(out, allocation, |header| header.to_string())
}

/// Write the manifest, passing each header through `decorate` (for color).
///
/// The dashed rule is sized from the undecorated header so escape codes do
/// not widen it.
pub fn write_manifest_with<W, F>(out: &mut W, allocation: &Allocation, decorate: F) -> io::Result<()>
where
    W: Write,
    F: Fn(&str) -> String,
{
    for disk in allocation.disks() {
        let header = disk_header(disk);
        let rule = "-".repeat(header.chars().count());
        writeln!(out, "{rule}")?;
        writeln!(out, "{}", decorate(&header))?;
        writeln!(out, "{rule}")?;
        for file in allocation.files_on(disk) {
            writeln!(out, "{}", file_line(file.size(), file.path()))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// JSON document describing a whole allocation.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub capacity: u64,
    pub disk_count: usize,
    pub file_count: usize,
    pub total_bytes: u64,
    pub disks: Vec<DiskReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskReport {
    pub id: u32,
    /// Four-digit directory name; absent past the addressable range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir_name: Option<String>,
    pub used: u64,
    pub free: u64,
    pub free_percent: u64,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl ManifestReport {
    pub fn from_allocation(allocation: &Allocation) -> Self {
        let disks = allocation
            .disks()
            .iter()
            .map(|disk| DiskReport {
                id: disk.id().get(),
                dir_name: disk.id().dir_name(),
                used: disk.used(),
                free: disk.free(),
                free_percent: disk.free_percent(),
                files: allocation
                    .files_on(disk)
                    .map(|file| FileEntry {
                        path: file.path().to_path_buf(),
                        size: file.size(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            capacity: allocation.capacity().bytes(),
            disk_count: allocation.disk_count(),
            file_count: allocation.files().len(),
            total_bytes: allocation.total_bytes(),
            disks,
        }
    }
}
