//! Hard-link materialization: `<dest>/<NNNN>/<relative path>` per disk.
//!
//! Links are created disk by disk in creation order. A failure stops the run
//! where it is; links already made stay in place.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::errors::{FitError, Result};
use crate::core::paths::contained_relative;
use crate::engine::record::{Allocation, DiskId, MAX_DISK_ID};

/// One planned hard link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub disk: DiskId,
    /// `<dest>/<NNNN>`
    pub disk_dir: PathBuf,
    pub source: PathBuf,
    pub target: PathBuf,
    pub size: u64,
}

/// Progress callbacks raised while materializing.
#[derive(Debug)]
pub enum LinkEvent<'a> {
    Linked(&'a LinkPlan),
    DiskComplete { disk: DiskId, files: usize, bytes: u64 },
}

/// Totals for a completed materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub disks: usize,
    pub links: usize,
    pub bytes: u64,
}

/// Compute every link for `allocation` under `dest`, without touching the
/// filesystem. Fails if a disk identity has no four-digit directory name.
pub fn plan_links(allocation: &Allocation, dest: &Path) -> Result<Vec<LinkPlan>> {
    let mut plans = Vec::with_capacity(allocation.files().len());
    for disk in allocation.disks() {
        let dir_name = disk.id().dir_name().ok_or(FitError::TooManyDisks {
            count: allocation.disk_count(),
            limit: MAX_DISK_ID,
        })?;
        let disk_dir = dest.join(dir_name);
        for file in allocation.files_on(disk) {
            plans.push(LinkPlan {
                disk: disk.id(),
                target: disk_dir.join(contained_relative(file.path())),
                disk_dir: disk_dir.clone(),
                source: file.path().to_path_buf(),
                size: file.size(),
            });
        }
    }
    Ok(plans)
}

/// Creates the per-disk link trees.
#[derive(Debug, Clone)]
pub struct Materializer {
    dest: PathBuf,
    dry_run: bool,
}

impl Materializer {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            dry_run: false,
        }
    }

    /// Report planned links without creating anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn materialize<F>(&self, allocation: &Allocation, mut on_event: F) -> Result<LinkSummary>
    where
        F: FnMut(LinkEvent<'_>),
    {
        let plans = plan_links(allocation, &self.dest)?;
        let mut summary = LinkSummary::default();

        for group in plans.chunk_by(|a, b| a.disk == b.disk) {
            let mut bytes = 0;
            for plan in group {
                if !self.dry_run {
                    link_one(plan)?;
                }
                bytes += plan.size;
                on_event(LinkEvent::Linked(plan));
            }
            summary.disks += 1;
            summary.links += group.len();
            summary.bytes += bytes;
            on_event(LinkEvent::DiskComplete {
                disk: group[0].disk,
                files: group.len(),
                bytes,
            });
        }
        Ok(summary)
    }
}

fn link_one(plan: &LinkPlan) -> Result<()> {
    if let Some(parent) = plan.target.parent() {
        make_dirs(parent)?;
    }
    fs::hard_link(&plan.source, &plan.target).map_err(|source| FitError::Link {
        source_path: plan.source.clone(),
        dest_path: plan.target.clone(),
        source,
    })
}

/// `mkdir -p` that reports a non-directory in the way as [`FitError::NotADirectory`].
pub fn make_dirs(path: &Path) -> Result<()> {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        match fs::metadata(&current) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(FitError::NotADirectory { path: current }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => create_dir(&current)?,
            Err(err) => return Err(FitError::io(&current, err)),
        }
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    match builder.create(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(FitError::io(path, err)),
    }
}
