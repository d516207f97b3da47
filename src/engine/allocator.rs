//! First-Fit Decreasing allocation.
//!
//! Files are placed largest first; each goes onto the earliest-created disk
//! with enough free space, or onto a new disk when none has room. Placements
//! are final, so the result is not always minimal: `[5, 4, 3, 3, 3, 2]` on
//! 10-byte disks is packed into three disks where two suffice.
//!
//! The disk scan is O(F·D). Past a configurable disk count a max segment tree
//! over free space takes over; it returns the same earliest-created disk.

use std::cmp::Reverse;

use crate::core::errors::{FitError, Result};
use crate::engine::index::FreeSpaceIndex;
use crate::engine::record::{Allocation, Disk, DiskCapacity, DiskId, FileRecord};

/// Disk count at which the linear scan hands over to the free-space index.
pub const DEFAULT_INDEXED_THRESHOLD: usize = 256;

/// Allocation engine. Owns the disk identity counter, so identities keep
/// increasing across calls on the same instance and restart at 1 for a new one.
#[derive(Debug, Clone)]
pub struct Allocator {
    capacity: DiskCapacity,
    next_id: DiskId,
    indexed_threshold: usize,
}

impl Allocator {
    pub fn new(capacity: DiskCapacity) -> Self {
        Self {
            capacity,
            next_id: DiskId::FIRST,
            indexed_threshold: DEFAULT_INDEXED_THRESHOLD,
        }
    }

    /// Use the free-space index once `threshold` disks exist (0: always).
    #[must_use]
    pub fn with_indexed_threshold(mut self, threshold: usize) -> Self {
        self.indexed_threshold = threshold;
        self
    }

    pub fn capacity(&self) -> DiskCapacity {
        self.capacity
    }

    /// Assign every file to exactly one disk.
    ///
    /// A file larger than the capacity is a caller bug (the collector filters
    /// them) and fails the whole run with [`FitError::CapacityViolation`]
    /// before any disk is created. An empty input yields an empty allocation.
    pub fn allocate(&mut self, files: Vec<FileRecord>) -> Result<Allocation> {
        let capacity = self.capacity.bytes();
        if let Some(oversized) = files.iter().find(|file| file.size() > capacity) {
            return Err(FitError::CapacityViolation {
                path: oversized.path().to_path_buf(),
                size: oversized.size(),
                capacity,
            });
        }

        // Stable sort: equal sizes keep their input order.
        let mut order: Vec<usize> = (0..files.len()).collect();
        order.sort_by_key(|&index| Reverse(files[index].size()));

        let mut disks: Vec<Disk> = Vec::new();
        let mut index: Option<FreeSpaceIndex> = None;

        for file_index in order {
            let size = files[file_index].size();

            if index.is_none() && disks.len() >= self.indexed_threshold {
                index = Some(FreeSpaceIndex::with_free_space(disks.iter().map(Disk::free)));
            }

            let position = match &index {
                Some(index) => index.first_fit(size),
                None => disks.iter().position(|disk| disk.free() >= size),
            };

            let position = position.unwrap_or_else(|| {
                disks.push(Disk::new(self.take_id(), self.capacity));
                if let Some(index) = index.as_mut() {
                    index.push(capacity);
                }
                disks.len() - 1
            });

            disks[position].assign(file_index, size);
            if let Some(index) = index.as_mut() {
                debug_assert_eq!(index.len(), disks.len());
                index.set(position, disks[position].free());
            }
        }

        Ok(Allocation::new(self.capacity, files, disks))
    }

    fn take_id(&mut self) -> DiskId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }
}

/// One-shot allocation with a fresh identity counter.
pub fn allocate(files: Vec<FileRecord>, capacity: DiskCapacity) -> Result<Allocation> {
    Allocator::new(capacity).allocate(files)
}
