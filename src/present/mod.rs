//! Consumers of an allocation: count, manifest, and hard-link layout.

pub mod manifest;
pub mod materialize;
