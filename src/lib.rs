#![forbid(unsafe_code)]

//! disk_fit: assign files to as few fixed-capacity disks as possible.
//!
//! The pipeline has three stages:
//! 1. **Collect**: walk the input directories into [`engine::record::FileRecord`]s,
//!    rejecting anything that could never fit
//! 2. **Allocate**: First-Fit Decreasing packing into [`engine::record::Disk`]s
//! 3. **Present**: print a count or manifest, or hard-link each disk's files
//!    into its own numbered directory
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use disk_fit::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use disk_fit::engine::allocator::Allocator;
//! use disk_fit::engine::record::{DiskCapacity, FileRecord};
//!
//! let capacity = DiskCapacity::parse("100b")?;
//! let files = vec![FileRecord::new("a", 60), FileRecord::new("b", 40)];
//! let allocation = Allocator::new(capacity).allocate(files)?;
//! assert_eq!(allocation.disk_count(), 1);
//! # Ok::<(), disk_fit::core::errors::FitError>(())
//! ```

pub mod prelude;

pub mod collector;
pub mod core;
pub mod engine;
pub mod logger;
pub mod present;
