//! Allocation engine: file/disk records and First-Fit Decreasing placement.

pub mod allocator;
mod index;
pub mod record;
