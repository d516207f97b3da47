//! FIT-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::units::format_size;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FitError>;

/// Where in a run a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad size syntax, non-positive capacity, bad config. Found before collection starts.
    Configuration,
    /// Unreadable paths, oversized files, unsupported entries. Found while collecting.
    Input,
    /// Disk count exceeds the addressable identity range, or an engine precondition broke.
    Capacity,
    /// Directory creation or link failure while materializing.
    Materialization,
    /// Output or serialization failure.
    Internal,
}

/// Top-level error type for disk fitting.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("[FIT-1001] invalid size {input:?}: {details}")]
    InvalidSize { input: String, details: String },

    #[error("[FIT-1002] unknown unit: '{unit}'")]
    UnknownUnit { unit: String },

    #[error("[FIT-1003] disk size is too small: {capacity}")]
    InvalidCapacity { capacity: i64 },

    #[error("[FIT-1004] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FIT-1005] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FIT-1006] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FIT-2001] can't access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FIT-2002] '{path}': not a regular file")]
    UnsupportedEntry { path: PathBuf },

    #[error("[FIT-2003] can never fit '{path}' ({})", format_size(*.size))]
    OversizedFile { path: PathBuf, size: u64 },

    #[error("[FIT-2004] no files found")]
    NoFiles,

    #[error("[FIT-3001] fitting takes too many disks: {count} (> {limit})")]
    TooManyDisks { count: usize, limit: usize },

    #[error(
        "[FIT-3002] '{path}' ({}) exceeds disk capacity ({})",
        format_size(*.size),
        format_size(*.capacity)
    )]
    CapacityViolation {
        path: PathBuf,
        size: u64,
        capacity: u64,
    },

    #[error("[FIT-4001] '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("[FIT-4002] can't link '{source_path}' to '{dest_path}': {source}")]
    Link {
        source_path: PathBuf,
        dest_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FIT-5001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl FitError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSize { .. } => "FIT-1001",
            Self::UnknownUnit { .. } => "FIT-1002",
            Self::InvalidCapacity { .. } => "FIT-1003",
            Self::InvalidConfig { .. } => "FIT-1004",
            Self::MissingConfig { .. } => "FIT-1005",
            Self::ConfigParse { .. } => "FIT-1006",
            Self::Io { .. } => "FIT-2001",
            Self::UnsupportedEntry { .. } => "FIT-2002",
            Self::OversizedFile { .. } => "FIT-2003",
            Self::NoFiles => "FIT-2004",
            Self::TooManyDisks { .. } => "FIT-3001",
            Self::CapacityViolation { .. } => "FIT-3002",
            Self::NotADirectory { .. } => "FIT-4001",
            Self::Link { .. } => "FIT-4002",
            Self::Serialization { .. } => "FIT-5001",
        }
    }

    /// Phase of the run the failure belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSize { .. }
            | Self::UnknownUnit { .. }
            | Self::InvalidCapacity { .. }
            | Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. } => ErrorCategory::Configuration,
            Self::Io { .. }
            | Self::UnsupportedEntry { .. }
            | Self::OversizedFile { .. }
            | Self::NoFiles => ErrorCategory::Input,
            Self::TooManyDisks { .. } | Self::CapacityViolation { .. } => ErrorCategory::Capacity,
            Self::NotADirectory { .. } | Self::Link { .. } => ErrorCategory::Materialization,
            Self::Serialization { .. } => ErrorCategory::Internal,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// A hard link that failed because source and destination live on
    /// different filesystems.
    #[must_use]
    pub fn is_cross_device_link(&self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Link { source, .. } => source.raw_os_error() == Some(libc::EXDEV),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for FitError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FitError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
