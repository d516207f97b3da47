//! Command-line definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use disk_fit::collector::walker::{Collector, SpecialFilePolicy, WalkerConfig};
use disk_fit::core::config::{Config, OutputFormat};
use disk_fit::core::errors::{ErrorCategory, FitError};
use disk_fit::core::paths::clean_path;
use disk_fit::core::units::format_size;
use disk_fit::engine::allocator::Allocator;
use disk_fit::engine::record::Allocation;
use disk_fit::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use disk_fit::present::manifest::{ManifestReport, count_line, write_manifest_with};
use disk_fit::present::materialize::{LinkEvent, Materializer};

/// fit: split files across fixed-size disks.
#[derive(Debug, Parser)]
#[command(
    name = "fit",
    author,
    version,
    about = "Fit files onto as few fixed-size disks as possible",
    long_about = None
)]
pub struct Cli {
    /// Disk size, e.g. 4700m or 25g (decimal units t/g/m/k/b).
    #[arg(short, long, value_name = "SIZE", allow_hyphen_values = true)]
    size: Option<String>,
    /// Hard-link each disk's files into DEST/NNNN instead of printing.
    #[arg(short, long, value_name = "DEST", conflicts_with = "count")]
    link: Option<String>,
    /// Print only the number of disks needed.
    #[arg(short = 'n', long)]
    count: bool,
    /// Descend into subdirectories.
    #[arg(short, long)]
    recursive: bool,
    /// Directories to collect files from.
    #[arg(value_name = "PATH", required_unless_present = "completions")]
    paths: Vec<String>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (results and errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Append a JSONL activity log to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Directory-walk worker threads (1 = sequential).
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,
    /// What to do with entries that are neither files nor directories.
    #[arg(long, value_name = "POLICY", value_parser = parse_policy)]
    special_files: Option<SpecialFilePolicy>,
    /// Inspect symlinks themselves instead of their targets.
    #[arg(long)]
    no_follow_symlinks: bool,
    /// With --link, print the planned links without creating anything.
    #[arg(long, requires = "link")]
    dry_run: bool,
    /// Generate a shell completion script and exit.
    #[arg(long, value_enum, value_name = "SHELL", exclusive = true)]
    completions: Option<CompletionShell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Failure reported by the library.
    #[error(transparent)]
    Fit(#[from] FitError),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Fit(err) => match err.category() {
                ErrorCategory::Configuration | ErrorCategory::Input | ErrorCategory::Capacity => 1,
                ErrorCategory::Materialization => 2,
                ErrorCategory::Internal => 3,
            },
            Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Run one fit invocation.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let config = effective_config(cli)?;
    let mode = resolve_output_mode(cli.json, config.output.format);
    if cli.no_color || !config.output.color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let mut log = ActivityLog::open(cli.log_file.as_deref().or(config.paths.jsonl_log.as_deref()));
    let started = Instant::now();
    log.record(
        LogEntry::new(EventType::RunStart, Severity::Info).with_details(format!(
            "mode={} paths={} config_hash={}",
            run_mode_label(cli),
            cli.paths.len(),
            config.stable_hash().unwrap_or_default()
        )),
    );

    let result = execute(cli, &config, mode, &mut log);
    match &result {
        Ok(()) => log.record(
            LogEntry::new(EventType::RunComplete, Severity::Info)
                .with_duration_ms(elapsed_ms(started)),
        ),
        Err(CliError::Fit(err)) => {
            if err.is_cross_device_link() && !cli.quiet {
                eprintln!("[FIT-LINK] source and destination are on different filesystems");
            }
            log.record(LogEntry::from_error(err).with_duration_ms(elapsed_ms(started)));
        }
        Err(other) => {
            let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
            entry.error_message = Some(other.to_string());
            log.record(entry.with_duration_ms(elapsed_ms(started)));
        }
    }
    result
}

fn execute(
    cli: &Cli,
    config: &Config,
    mode: OutputMode,
    log: &mut ActivityLog,
) -> Result<(), CliError> {
    let capacity = config.disk_capacity()?.ok_or_else(|| {
        CliError::User("a disk size is required: pass -s SIZE or set disk.size".to_string())
    })?;

    let roots: Vec<PathBuf> = cli
        .paths
        .iter()
        .map(|path| PathBuf::from(clean_path(path)))
        .collect();

    let collect_started = Instant::now();
    let collected = Collector::new(WalkerConfig::from_config(
        &config.collector,
        roots,
        capacity,
    ))
    .collect()?;
    let total_bytes: u64 = collected.files.iter().map(|file| file.size()).sum();
    if cli.verbose {
        for skipped in &collected.skipped {
            eprintln!("[FIT-COLLECT] skipped {}", skipped.display());
        }
        eprintln!(
            "[FIT-COLLECT] {} files ({}) in {} directories",
            collected.files.len(),
            format_size(total_bytes),
            collected.directories
        );
    }
    log.record(
        LogEntry::new(EventType::CollectComplete, Severity::Info)
            .with_size(total_bytes)
            .with_counts(None, Some(collected.files.len()))
            .with_duration_ms(elapsed_ms(collect_started)),
    );

    if collected.files.is_empty() {
        return Err(FitError::NoFiles.into());
    }

    let allocate_started = Instant::now();
    let allocation = Allocator::new(capacity)
        .with_indexed_threshold(config.engine.indexed_threshold)
        .allocate(collected.files)?;
    if cli.verbose {
        eprintln!(
            "[FIT-ENGINE] {} files onto {} disks of {}",
            allocation.files().len(),
            allocation.disk_count(),
            format_size(capacity.bytes())
        );
    }
    log.record(
        LogEntry::new(EventType::AllocateComplete, Severity::Info)
            .with_size(capacity.bytes())
            .with_counts(Some(allocation.disk_count()), Some(allocation.files().len()))
            .with_duration_ms(elapsed_ms(allocate_started)),
    );
    allocation.ensure_addressable(config.disk.max_disks)?;

    if cli.count {
        emit_count(mode, &allocation)
    } else if let Some(dest) = &cli.link {
        emit_links(cli, mode, &allocation, Path::new(&clean_path(dest)), log)
    } else {
        emit_manifest(mode, &allocation)
    }
}

fn emit_count(mode: OutputMode, allocation: &Allocation) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", count_line(allocation.disk_count()))?;
            Ok(())
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "count",
            "disks": allocation.disk_count(),
            "files": allocation.files().len(),
            "total_bytes": allocation.total_bytes(),
        })),
    }
}

fn emit_manifest(mode: OutputMode, allocation: &Allocation) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            write_manifest_with(&mut stdout, allocation, |header| header.bold().to_string())?;
            stdout.flush()?;
            Ok(())
        }
        OutputMode::Json => {
            let report = ManifestReport::from_allocation(allocation);
            write_json_line(&serde_json::to_value(report)?)
        }
    }
}

#[derive(Debug, Serialize)]
struct LinkRecord {
    disk: u32,
    source: PathBuf,
    target: PathBuf,
}

fn emit_links(
    cli: &Cli,
    mode: OutputMode,
    allocation: &Allocation,
    dest: &Path,
    log: &mut ActivityLog,
) -> Result<(), CliError> {
    let materializer = Materializer::new(dest).with_dry_run(cli.dry_run);
    let mut stdout = io::stdout().lock();
    let mut records = Vec::new();
    let mut write_error: Option<io::Error> = None;

    let summary = materializer.materialize(allocation, |event| match event {
        LinkEvent::Linked(plan) => match mode {
            OutputMode::Human if !cli.quiet => {
                if write_error.is_none()
                    && let Err(err) = writeln!(
                        stdout,
                        "{} -> {}",
                        plan.source.display(),
                        plan.disk_dir.display()
                    )
                {
                    write_error = Some(err);
                }
            }
            OutputMode::Human => {}
            OutputMode::Json => records.push(LinkRecord {
                disk: plan.disk.get(),
                source: plan.source.clone(),
                target: plan.target.clone(),
            }),
        },
        LinkEvent::DiskComplete { disk, files, bytes } => {
            if cli.verbose {
                eprintln!(
                    "[FIT-LINK] disk {disk}: {files} files, {}",
                    format_size(bytes)
                );
            }
            log.record(
                LogEntry::new(EventType::DiskLinked, Severity::Info)
                    .with_path(&dest.join(disk.dir_name().unwrap_or_default()))
                    .with_size(bytes)
                    .with_counts(None, Some(files))
                    .with_details(if cli.dry_run { "dry_run" } else { "linked" }),
            );
        }
    })?;

    if let Some(err) = write_error {
        return Err(err.into());
    }
    match mode {
        OutputMode::Human => {
            if cli.dry_run && !cli.quiet {
                writeln!(
                    stdout,
                    "dry run: {} links across {} disks, nothing created",
                    summary.links, summary.disks
                )?;
            }
            Ok(())
        }
        OutputMode::Json => {
            drop(stdout);
            write_json_line(&json!({
                "command": "link",
                "dest": dest,
                "dry_run": cli.dry_run,
                "disks": summary.disks,
                "links": summary.links,
                "bytes": summary.bytes,
                "entries": records,
            }))
        }
    }
}

/// Config file and env, then command-line flags on top.
fn effective_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(size) = &cli.size {
        config.disk.size = Some(size.clone());
    }
    if cli.recursive {
        config.collector.recursive = true;
    }
    if let Some(jobs) = cli.jobs {
        config.collector.parallelism = jobs;
    }
    if let Some(policy) = cli.special_files {
        config.collector.special_files = policy;
    }
    if cli.no_follow_symlinks {
        config.collector.follow_symlinks = false;
    }
    config.validate()?;
    Ok(config)
}

fn parse_policy(raw: &str) -> Result<SpecialFilePolicy, String> {
    raw.parse().map_err(|err: FitError| err.to_string())
}

fn run_mode_label(cli: &Cli) -> &'static str {
    match (cli.count, cli.link.is_some(), cli.dry_run) {
        (true, _, _) => "count",
        (_, true, true) => "link-dry-run",
        (_, true, false) => "link",
        _ => "manifest",
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

/// `--json` wins; otherwise the configured format. `auto` is human output,
/// piped or not, so redirected manifests keep their layout.
fn resolve_output_mode(json_flag: bool, format: OutputFormat) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match format {
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Human | OutputFormat::Auto => OutputMode::Human,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Activity log that is a no-op when no path is configured.
struct ActivityLog {
    writer: Option<JsonlWriter>,
}

impl ActivityLog {
    fn open(path: Option<&Path>) -> Self {
        Self {
            writer: path.map(|path| JsonlWriter::open(JsonlConfig::new(path))),
        }
    }

    fn record(&mut self, entry: LogEntry) {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_entry(&entry);
        }
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.close();
        }
    }
}
