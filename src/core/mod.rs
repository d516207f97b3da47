//! Core types: errors, configuration, size units, path helpers.

pub mod config;
pub mod errors;
pub mod paths;
pub mod units;
