//! File and disk records plus the owned result of an allocation run.
//!
//! An [`Allocation`] owns every [`FileRecord`] once; each [`Disk`] refers to
//! its files by index into that master list.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{FitError, Result};
use crate::core::units::parse_size;

/// Highest disk identity that fits the four-digit directory naming.
pub const MAX_DISK_ID: usize = 9999;

/// One input file. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileRecord {
    path: PathBuf,
    size: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Disk identity: 1-based, increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DiskId(u32);

impl DiskId {
    pub const FIRST: Self = Self(1);

    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Zero-padded four-digit directory name, if the identity fits.
    pub fn dir_name(self) -> Option<String> {
        usize::try_from(self.0)
            .is_ok_and(|id| id <= MAX_DISK_ID)
            .then(|| format!("{:04}", self.0))
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated disk size in bytes, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DiskCapacity(u64);

impl DiskCapacity {
    /// Reject zero and negative sizes.
    pub fn new(bytes: i64) -> Result<Self> {
        u64::try_from(bytes)
            .ok()
            .filter(|&b| b > 0)
            .map(Self)
            .ok_or(FitError::InvalidCapacity { capacity: bytes })
    }

    /// Parse a size with an optional unit suffix and validate it.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(parse_size(text)?)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }
}

/// One fixed-capacity disk and the files assigned to it, in assignment order.
///
/// `free == capacity - sum(sizes)` always holds; the allocator is the only
/// writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    id: DiskId,
    capacity: u64,
    free: u64,
    files: Vec<usize>,
}

impl Disk {
    pub(crate) fn new(id: DiskId, capacity: DiskCapacity) -> Self {
        Self {
            id,
            capacity: capacity.bytes(),
            free: capacity.bytes(),
            files: Vec::new(),
        }
    }

    pub(crate) fn assign(&mut self, file_index: usize, size: u64) {
        debug_assert!(size <= self.free, "assignment would overflow disk");
        self.free -= size;
        self.files.push(file_index);
    }

    pub fn id(&self) -> DiskId {
        self.id
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn free(&self) -> u64 {
        self.free
    }

    pub fn used(&self) -> u64 {
        self.capacity - self.free
    }

    /// Whole percent of capacity still free, truncated.
    pub fn free_percent(&self) -> u64 {
        u64::try_from(u128::from(self.free) * 100 / u128::from(self.capacity)).unwrap_or(100)
    }

    /// Indices into [`Allocation::files`], in assignment order.
    pub fn file_indices(&self) -> &[usize] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Result of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    capacity: DiskCapacity,
    files: Vec<FileRecord>,
    disks: Vec<Disk>,
}

impl Allocation {
    pub(crate) fn new(capacity: DiskCapacity, files: Vec<FileRecord>, disks: Vec<Disk>) -> Self {
        Self {
            capacity,
            files,
            disks,
        }
    }

    pub fn capacity(&self) -> DiskCapacity {
        self.capacity
    }

    /// Master file list, in input order.
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Disks in creation order.
    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(FileRecord::size).sum()
    }

    /// Files on `disk`, in assignment order.
    pub fn files_on<'a>(&'a self, disk: &'a Disk) -> impl Iterator<Item = &'a FileRecord> + 'a {
        disk.files.iter().map(move |&index| &self.files[index])
    }

    /// Fail when the disk count exceeds what the output layout can name.
    pub fn ensure_addressable(&self, limit: usize) -> Result<()> {
        if self.disks.len() > limit {
            return Err(FitError::TooManyDisks {
                count: self.disks.len(),
                limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(bytes: i64) -> DiskCapacity {
        DiskCapacity::new(bytes).unwrap()
    }

    #[test]
    fn capacity_rejects_zero_and_negative() {
        assert_eq!(DiskCapacity::new(0).unwrap_err().code(), "FIT-1003");
        assert_eq!(DiskCapacity::new(-10).unwrap_err().code(), "FIT-1003");
        assert_eq!(capacity(1).bytes(), 1);
        assert_eq!(DiskCapacity::parse("4g").unwrap().bytes(), 4_000_000_000);
        assert_eq!(DiskCapacity::parse("0k").unwrap_err().code(), "FIT-1003");
    }

    #[test]
    fn disk_tracks_free_space() {
        let mut disk = Disk::new(DiskId::FIRST, capacity(100));
        disk.assign(0, 60);
        disk.assign(3, 40);
        assert_eq!(disk.free(), 0);
        assert_eq!(disk.used(), 100);
        assert_eq!(disk.file_indices(), &[0, 3]);
        assert_eq!(disk.free_percent(), 0);
    }

    #[test]
    fn free_percent_truncates() {
        let mut disk = Disk::new(DiskId::FIRST, capacity(3));
        disk.assign(0, 1);
        assert_eq!(disk.free_percent(), 66);
    }

    #[test]
    fn disk_id_directory_names() {
        assert_eq!(DiskId::FIRST.dir_name().as_deref(), Some("0001"));
        assert_eq!(DiskId(42).dir_name().as_deref(), Some("0042"));
        assert_eq!(DiskId(9999).dir_name().as_deref(), Some("9999"));
        assert_eq!(DiskId(10_000).dir_name(), None);
        assert_eq!(DiskId::FIRST.next().get(), 2);
    }

    #[test]
    fn disk_id_next_stops_at_the_top_of_the_range() {
        let last = DiskId(u32::MAX);
        assert_eq!(last.next(), last);
        assert_eq!(last.next().dir_name(), None);
    }

    #[test]
    fn addressable_limit_is_inclusive() {
        let cap = capacity(10);
        let disks = (1..=3).map(|id| Disk::new(DiskId(id), cap)).collect();
        let allocation = Allocation::new(cap, Vec::new(), disks);
        assert!(allocation.ensure_addressable(3).is_ok());
        match allocation.ensure_addressable(2).unwrap_err() {
            FitError::TooManyDisks { count, limit } => {
                assert_eq!((count, limit), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
