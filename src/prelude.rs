//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use disk_fit::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{FitError, Result};
pub use crate::core::units::{format_size, parse_size};

// Engine
pub use crate::engine::allocator::{Allocator, allocate};
pub use crate::engine::record::{Allocation, Disk, DiskCapacity, DiskId, FileRecord};

// Collector
pub use crate::collector::walker::{Collected, Collector, SpecialFilePolicy, WalkerConfig};

// Presentation
pub use crate::present::manifest::{ManifestReport, count_line, write_manifest};
pub use crate::present::materialize::{LinkEvent, LinkSummary, Materializer};
