//! Filesystem collection of the files to fit.

pub mod walker;
