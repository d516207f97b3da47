//! Configuration system: TOML file + env var overrides + defaults.
//!
//! Command-line flags are applied on top by the binary; everything here is
//! usable from the library without a CLI.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collector::walker::SpecialFilePolicy;
use crate::core::errors::{FitError, Result};
use crate::engine::allocator::DEFAULT_INDEXED_THRESHOLD;
use crate::engine::record::{DiskCapacity, MAX_DISK_ID};

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub disk: DiskConfig,
    pub collector: CollectorConfig,
    pub engine: EngineConfig,
    pub output: OutputConfig,
    pub paths: PathsConfig,
}

/// Target disk settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiskConfig {
    /// Default disk size (`"4700m"`, `"25g"`, ...) used when `-s` is omitted.
    pub size: Option<String>,
    /// Highest disk identity the output layout can represent.
    pub max_disks: usize,
}

/// Filesystem collection behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    pub recursive: bool,
    /// Worker threads for the walk; 1 walks on the calling thread.
    pub parallelism: usize,
    pub special_files: SpecialFilePolicy,
    pub follow_symlinks: bool,
}

/// Allocation engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Switch from the linear disk scan to the free-space index once this many
    /// disks exist. `0` indexes from the first disk.
    pub indexed_threshold: usize,
}

/// Presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

/// Requested output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human output; `--json` still switches to JSON.
    #[default]
    Auto,
    Human,
    Json,
}

impl FromStr for OutputFormat {
    type Err = FitError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(FitError::ConfigParse {
                context: "output.format",
                details: format!("expected auto, human or json, got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Human => "human",
            Self::Json => "json",
        })
    }
}

/// Filesystem paths used by fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Activity log; no log is written when unset.
    pub jsonl_log: Option<PathBuf>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            size: None,
            max_disks: MAX_DISK_ID,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            parallelism: 1,
            special_files: SpecialFilePolicy::Reject,
            follow_symlinks: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indexed_threshold: DEFAULT_INDEXED_THRESHOLD,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Auto,
            color: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let config_home = env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        Self {
            config_file: config_home.join("fit").join("config.toml"),
            jsonl_log: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from an explicit path, `$FIT_CONFIG`, or the default path,
    /// then apply env overrides.
    ///
    /// A missing file is only an error when the path was given explicitly.
    /// Values are not range-checked here: apply command-line overrides first,
    /// then call [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env_var("FIT_CONFIG").map(PathBuf::from));
        let is_explicit_path = explicit.is_some();
        let path_buf = explicit.unwrap_or_else(Self::default_path);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FitError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str(&raw)?
        } else if is_explicit_path {
            return Err(FitError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the JSON form, stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Parsed default disk capacity, if one is configured.
    pub fn disk_capacity(&self) -> Result<Option<DiskCapacity>> {
        self.disk.size.as_deref().map(DiskCapacity::parse).transpose()
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FIT_DISK_SIZE") {
            self.disk.size = Some(raw);
        }
        if let Some(raw) = lookup("FIT_MAX_DISKS") {
            self.disk.max_disks = parse_env("FIT_MAX_DISKS", &raw)?;
        }
        if let Some(raw) = lookup("FIT_RECURSIVE") {
            self.collector.recursive = parse_env("FIT_RECURSIVE", &raw)?;
        }
        if let Some(raw) = lookup("FIT_PARALLELISM") {
            self.collector.parallelism = parse_env("FIT_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("FIT_SPECIAL_FILES") {
            self.collector.special_files = raw.parse()?;
        }
        if let Some(raw) = lookup("FIT_FOLLOW_SYMLINKS") {
            self.collector.follow_symlinks = parse_env("FIT_FOLLOW_SYMLINKS", &raw)?;
        }
        if let Some(raw) = lookup("FIT_INDEXED_THRESHOLD") {
            self.engine.indexed_threshold = parse_env("FIT_INDEXED_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("FIT_OUTPUT_FORMAT") {
            self.output.format = raw.parse()?;
        }
        if let Some(raw) = lookup("FIT_LOG_FILE") {
            self.paths.jsonl_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    /// Reject out-of-range values. Run once every override source has been
    /// applied.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DISK_ID).contains(&self.disk.max_disks) {
            return Err(FitError::InvalidConfig {
                details: format!(
                    "disk.max_disks must be in [1, {MAX_DISK_ID}], got {}",
                    self.disk.max_disks
                ),
            });
        }
        if self.collector.parallelism == 0 {
            return Err(FitError::InvalidConfig {
                details: "collector.parallelism must be >= 1".to_string(),
            });
        }
        self.disk_capacity()?;
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| FitError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
