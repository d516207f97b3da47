//! Filesystem collector: turns root directories into [`FileRecord`]s.
//!
//! Entries are reported depth-first in directory-entry order, subdirectories
//! expanded where they are met. The parallel walk tags every entry with its
//! position key (the chain of directory-entry indices from the root) and sorts
//! on it, which reproduces the sequential order exactly. It also reports the
//! same first error.

#![allow(missing_docs)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::CollectorConfig;
use crate::core::errors::{FitError, Result};
use crate::engine::record::{DiskCapacity, FileRecord};

/// What to do with entries that are neither regular files nor directories
/// (sockets, FIFOs, device nodes, unfollowed symlinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpecialFilePolicy {
    /// Abort the run with [`FitError::UnsupportedEntry`].
    #[default]
    Reject,
    /// Leave the entry out and report it in [`Collected::skipped`].
    Skip,
}

impl FromStr for SpecialFilePolicy {
    type Err = FitError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            other => Err(FitError::ConfigParse {
                context: "collector.special_files",
                details: format!("expected reject or skip, got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for SpecialFilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::Skip => "skip",
        })
    }
}

/// Walker configuration for one collection run.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root_paths: Vec<PathBuf>,
    pub capacity: DiskCapacity,
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub parallelism: usize,
    pub special_files: SpecialFilePolicy,
}

impl WalkerConfig {
    pub fn from_config(
        config: &CollectorConfig,
        root_paths: Vec<PathBuf>,
        capacity: DiskCapacity,
    ) -> Self {
        Self {
            root_paths,
            capacity,
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
            parallelism: config.parallelism,
            special_files: config.special_files,
        }
    }
}

/// Output of a collection run.
#[derive(Debug, Default)]
pub struct Collected {
    /// Files in walk order.
    pub files: Vec<FileRecord>,
    /// Entries left out: special files under [`SpecialFilePolicy::Skip`] and
    /// directories that would re-enter one of their own ancestors.
    pub skipped: Vec<PathBuf>,
    /// Directories read, roots included.
    pub directories: usize,
}

/// Collects the files under a set of root directories.
pub struct Collector {
    config: WalkerConfig,
}

impl Collector {
    pub fn new(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Walk every root in order. Any unreadable path, oversized file or
    /// rejected entry aborts the whole collection.
    pub fn collect(&self) -> Result<Collected> {
        if self.config.parallelism > 1 {
            self.collect_parallel()
        } else {
            self.collect_sequential()
        }
    }

    fn collect_sequential(&self) -> Result<Collected> {
        let mut collected = Collected::default();
        for root in &self.config.root_paths {
            let identity = root_identity(root)?;
            let mut ancestors: Vec<DirIdentity> = identity.into_iter().collect();
            self.walk_sequential(root, &mut ancestors, &mut collected)?;
        }
        Ok(collected)
    }

    fn walk_sequential(
        &self,
        dir: &Path,
        ancestors: &mut Vec<DirIdentity>,
        collected: &mut Collected,
    ) -> Result<()> {
        let listing = scan_directory(dir, &self.config);
        collected.directories += 1;

        for found in listing.entries {
            match found {
                Found::File(record) => collected.files.push(record),
                Found::Skipped(path) => collected.skipped.push(path),
                Found::Dir { path, identity } => {
                    if !self.config.recursive {
                        continue;
                    }
                    if identity.is_some_and(|id| ancestors.contains(&id)) {
                        collected.skipped.push(path);
                        continue;
                    }
                    ancestors.extend(identity);
                    let walked = self.walk_sequential(&path, ancestors, collected);
                    if identity.is_some() {
                        ancestors.pop();
                    }
                    walked?;
                }
            }
        }

        listing.failure.map_or(Ok(()), Err)
    }

    fn collect_parallel(&self) -> Result<Collected> {
        let (work_tx, work_rx) = channel::unbounded::<WorkItem>();
        let (event_tx, event_rx) = channel::unbounded::<WalkEvent>();
        let in_flight = AtomicUsize::new(0);
        let first_failure: Mutex<Option<Vec<u32>>> = Mutex::new(None);

        for (index, root) in self.config.root_paths.iter().enumerate() {
            let key = vec![position(index)];
            match root_identity(root) {
                Ok(identity) => {
                    in_flight.fetch_add(1, Ordering::Release);
                    let _ = work_tx.send(WorkItem {
                        dir: root.clone(),
                        key,
                        ancestors: identity.into_iter().collect(),
                    });
                }
                Err(error) => {
                    record_failure(&first_failure, &key);
                    let _ = event_tx.send(WalkEvent::Failed(key, error));
                }
            }
        }

        let mut files: Vec<(Vec<u32>, FileRecord)> = Vec::new();
        let mut skipped: Vec<(Vec<u32>, PathBuf)> = Vec::new();
        let mut failures: Vec<(Vec<u32>, FitError)> = Vec::new();
        let mut directories = 0usize;

        thread::scope(|scope| {
            for _ in 0..self.config.parallelism {
                let work_rx = work_rx.clone();
                let work_tx = work_tx.clone();
                let event_tx = event_tx.clone();
                let in_flight = &in_flight;
                let first_failure = &first_failure;
                let config = &self.config;
                scope.spawn(move || {
                    walker_thread(
                        &work_rx,
                        &work_tx,
                        &event_tx,
                        in_flight,
                        first_failure,
                        config,
                    );
                });
            }
            // Workers hold their own clones; the receiver below ends once they exit.
            drop(event_tx);

            for event in event_rx {
                match event {
                    WalkEvent::File(key, record) => files.push((key, record)),
                    WalkEvent::Skipped(key, path) => skipped.push((key, path)),
                    WalkEvent::Failed(key, error) => failures.push((key, error)),
                    WalkEvent::Directory => directories += 1,
                }
            }
        });

        if let Some((_, error)) = failures.into_iter().min_by(|a, b| a.0.cmp(&b.0)) {
            return Err(error);
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        skipped.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Collected {
            files: files.into_iter().map(|(_, record)| record).collect(),
            skipped: skipped.into_iter().map(|(_, path)| path).collect(),
            directories,
        })
    }
}

/// Device and inode of a directory, used to stop symlink loops.
type DirIdentity = (u64, u64);

/// A directory waiting to be read by a parallel worker.
struct WorkItem {
    dir: PathBuf,
    key: Vec<u32>,
    ancestors: Vec<DirIdentity>,
}

enum WalkEvent {
    File(Vec<u32>, FileRecord),
    Skipped(Vec<u32>, PathBuf),
    Failed(Vec<u32>, FitError),
    Directory,
}

/// One classified directory entry.
enum Found {
    File(FileRecord),
    Dir {
        path: PathBuf,
        identity: Option<DirIdentity>,
    },
    Skipped(PathBuf),
}

/// Entries of one directory in entry order, cut short at the first failure.
struct Listing {
    entries: Vec<Found>,
    failure: Option<FitError>,
}

fn walker_thread(
    work_rx: &channel::Receiver<WorkItem>,
    work_tx: &channel::Sender<WorkItem>,
    event_tx: &channel::Sender<WalkEvent>,
    in_flight: &AtomicUsize,
    first_failure: &Mutex<Option<Vec<u32>>>,
    config: &WalkerConfig,
) {
    loop {
        match work_rx.recv_timeout(Duration::from_millis(20)) {
            Ok(item) => {
                process_work_item(item, work_tx, event_tx, in_flight, first_failure, config);
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            Err(channel::RecvTimeoutError::Timeout) => {
                if in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
            }
            Err(channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn process_work_item(
    item: WorkItem,
    work_tx: &channel::Sender<WorkItem>,
    event_tx: &channel::Sender<WalkEvent>,
    in_flight: &AtomicUsize,
    first_failure: &Mutex<Option<Vec<u32>>>,
    config: &WalkerConfig,
) {
    // Everything under a key that sorts after a known failure is unreachable
    // in walk order, so it is not read at all.
    if first_failure
        .lock()
        .as_ref()
        .is_some_and(|failed| item.key > *failed)
    {
        return;
    }

    let listing = scan_directory(&item.dir, config);
    let _ = event_tx.send(WalkEvent::Directory);

    let child_key = |index: usize| {
        let mut key = Vec::with_capacity(item.key.len() + 1);
        key.extend_from_slice(&item.key);
        key.push(position(index));
        key
    };

    let entry_count = listing.entries.len();
    for (index, found) in listing.entries.into_iter().enumerate() {
        match found {
            Found::File(record) => {
                let _ = event_tx.send(WalkEvent::File(child_key(index), record));
            }
            Found::Skipped(path) => {
                let _ = event_tx.send(WalkEvent::Skipped(child_key(index), path));
            }
            Found::Dir { path, identity } => {
                if !config.recursive {
                    continue;
                }
                if identity.is_some_and(|id| item.ancestors.contains(&id)) {
                    let _ = event_tx.send(WalkEvent::Skipped(child_key(index), path));
                    continue;
                }
                let mut ancestors = item.ancestors.clone();
                ancestors.extend(identity);
                in_flight.fetch_add(1, Ordering::Release);
                if work_tx
                    .send(WorkItem {
                        dir: path,
                        key: child_key(index),
                        ancestors,
                    })
                    .is_err()
                {
                    in_flight.fetch_sub(1, Ordering::Release);
                }
            }
        }
    }

    if let Some(error) = listing.failure {
        let key = child_key(entry_count);
        record_failure(first_failure, &key);
        let _ = event_tx.send(WalkEvent::Failed(key, error));
    }
}

fn record_failure(first_failure: &Mutex<Option<Vec<u32>>>, key: &[u32]) {
    let mut slot = first_failure.lock();
    if slot.as_deref().is_none_or(|current| key < current) {
        *slot = Some(key.to_vec());
    }
}

/// Read and classify one directory's entries in entry order.
fn scan_directory(dir: &Path, config: &WalkerConfig) -> Listing {
    let mut entries = Vec::new();
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(source) => {
            return Listing {
                entries,
                failure: Some(FitError::io(dir, source)),
            };
        }
    };

    for entry in read {
        let found = entry
            .map_err(|source| FitError::io(dir, source))
            .and_then(|entry| classify(&entry.path(), config));
        match found {
            Ok(found) => entries.push(found),
            Err(error) => {
                return Listing {
                    entries,
                    failure: Some(error),
                };
            }
        }
    }

    Listing {
        entries,
        failure: None,
    }
}

fn classify(path: &Path, config: &WalkerConfig) -> Result<Found> {
    let meta =
        metadata_for_path(path, config.follow_symlinks).map_err(|e| FitError::io(path, e))?;

    if meta.is_file() {
        let size = meta.len();
        if size > config.capacity.bytes() {
            return Err(FitError::OversizedFile {
                path: path.to_path_buf(),
                size,
            });
        }
        return Ok(Found::File(FileRecord::new(path, size)));
    }

    if meta.is_dir() {
        return Ok(Found::Dir {
            path: path.to_path_buf(),
            identity: dir_identity(&meta),
        });
    }

    match config.special_files {
        SpecialFilePolicy::Reject => Err(FitError::UnsupportedEntry {
            path: path.to_path_buf(),
        }),
        SpecialFilePolicy::Skip => Ok(Found::Skipped(path.to_path_buf())),
    }
}

/// Roots are always resolved through symlinks, like any path argument.
fn root_identity(root: &Path) -> Result<Option<DirIdentity>> {
    let meta = fs::metadata(root).map_err(|e| FitError::io(root, e))?;
    Ok(dir_identity(&meta))
}

fn metadata_for_path(path: &Path, follow_symlinks: bool) -> std::io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

fn dir_identity(meta: &fs::Metadata) -> Option<DirIdentity> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Some((meta.dev(), meta.ino()))
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        None
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
