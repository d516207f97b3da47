//! CLI end-to-end tests: manifest, count and link modes plus every fatal path.

mod common;

use std::fs;
use std::path::Path;

use serde_json::Value;

use common::{run_cli_case, run_cli_case_in, write_file};

/// `data/f60`, `data/f40`, ... sized to the reference scenario.
fn reference_tree(root: &Path) {
    for size in [60, 40, 30, 20, 10] {
        write_file(root, &format!("data/f{size}"), size);
    }
}

#[test]
fn help_command_prints_usage() {
    let result = run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: fit [OPTIONS]"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_flag_prints_version() {
    let result = run_cli_case("version_flag_prints_version", &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.starts_with("fit "), "log: {}", result.log_path.display());
}

#[test]
fn manifest_for_reference_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "manifest_for_reference_scenario",
        &["-s", "100", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let expected = "\
----------------------
Disk #1, 0% (0B) free:
----------------------
       60B data/f60
       40B data/f40

------------------------
Disk #2, 40% (40B) free:
------------------------
       30B data/f30
       20B data/f20
       10B data/f10

";
    assert_eq!(result.stdout, expected, "log: {}", result.log_path.display());
}

#[test]
fn repeated_and_trailing_slashes_are_cleaned() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "repeated_and_trailing_slashes_are_cleaned",
        &["-s", "100", ".//data//"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("       60B ./data/f60\n"),
        "log: {}",
        result.log_path.display()
    );
}

#[test]
fn count_mode_pluralizes() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let two = run_cli_case_in("count_two", &["-n", "-s", "100", "data"], Some(tmp.path()), &[]);
    assert!(two.status.success(), "log: {}", two.log_path.display());
    assert_eq!(two.stdout, "2 disks.\n");

    let one = run_cli_case_in("count_one", &["-n", "-s", "1k", "data"], Some(tmp.path()), &[]);
    assert!(one.status.success(), "log: {}", one.log_path.display());
    assert_eq!(one.stdout, "1 disk.\n");
}

#[test]
fn recursion_is_opt_in() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(tmp.path(), "data/top", 10);
    write_file(tmp.path(), "data/nested/deep", 20);

    let flat = run_cli_case_in("recursion_flat", &["-s", "1k", "data"], Some(tmp.path()), &[]);
    assert!(flat.status.success(), "log: {}", flat.log_path.display());
    assert!(flat.stdout.contains("data/top"));
    assert!(!flat.stdout.contains("data/nested/deep"));

    let deep = run_cli_case_in(
        "recursion_deep",
        &["-r", "-s", "1k", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(deep.status.success(), "log: {}", deep.log_path.display());
    assert!(deep.stdout.contains("       20B data/nested/deep\n"));
}

#[test]
fn parallel_walk_matches_sequential_output() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..24 {
        write_file(tmp.path(), &format!("data/d{}/f{i}", i % 5), 10 + i);
    }

    let seq = run_cli_case_in("walk_seq", &["-r", "-s", "100", "data"], Some(tmp.path()), &[]);
    let par = run_cli_case_in(
        "walk_par",
        &["-r", "-j", "4", "-s", "100", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(seq.status.success(), "log: {}", seq.log_path.display());
    assert!(par.status.success(), "log: {}", par.log_path.display());
    assert_eq!(seq.stdout, par.stdout);
}

#[test]
fn oversized_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in("oversized_file_is_fatal", &["-s", "50", "data"], Some(tmp.path()), &[]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stdout.is_empty());
    assert!(
        result.stderr.contains("can never fit 'data/f60' (60B)"),
        "log: {}",
        result.log_path.display()
    );
    assert_eq!(result.stderr.lines().count(), 1);
}

#[test]
fn invalid_sizes_are_configuration_errors() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    for (size, message) in [
        ("12x", "unknown unit: 'x'"),
        ("12kb", "unknown unit: 'kb'"),
        ("abc", "invalid size"),
        ("0", "disk size is too small"),
        ("-5k", "disk size is too small"),
    ] {
        let result = run_cli_case_in(
            &format!("invalid_size_{size}"),
            &["-s", size, "data"],
            Some(tmp.path()),
            &[],
        );
        assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
        assert!(
            result.stderr.starts_with("fit: ") && result.stderr.contains(message),
            "size {size}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn missing_size_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());
    let result = run_cli_case_in("missing_size_is_reported", &["data"], Some(tmp.path()), &[]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("a disk size is required"));
}

#[test]
fn empty_directory_has_no_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("empty")).unwrap();
    let result = run_cli_case_in("empty_directory", &["-s", "1g", "empty"], Some(tmp.path()), &[]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("no files found"));
}

#[test]
fn missing_path_is_an_input_error() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_cli_case_in("missing_path", &["-s", "1g", "nowhere"], Some(tmp.path()), &[]);
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("can't access 'nowhere'"));
}

#[test]
fn max_disks_ceiling_is_enforced() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());
    let result = run_cli_case_in(
        "max_disks_ceiling",
        &["-n", "-s", "100", "data"],
        Some(tmp.path()),
        &[("FIT_MAX_DISKS", "1")],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("too many disks: 2 (> 1)"));
}

#[test]
fn link_mode_builds_numbered_trees() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "link_mode_builds_numbered_trees",
        &["-s", "100", "-l", "out/", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(
        result.stdout,
        "data/f60 -> out/0001\ndata/f40 -> out/0001\n\
         data/f30 -> out/0002\ndata/f20 -> out/0002\ndata/f10 -> out/0002\n"
    );
    for (disk, name, len) in [("0001", "f60", 60), ("0001", "f40", 40), ("0002", "f10", 10)] {
        let linked = tmp.path().join("out").join(disk).join("data").join(name);
        assert_eq!(fs::metadata(&linked).unwrap().len(), len);
    }
}

#[test]
fn link_into_a_file_fails_as_materialization_error() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());
    fs::write(tmp.path().join("out"), b"in the way").unwrap();

    let result = run_cli_case_in(
        "link_into_file",
        &["-s", "100", "-l", "out", "data"],
        Some(tmp.path()),
        &[],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("'out' is not a directory"));
}

#[test]
fn dry_run_creates_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "dry_run_creates_nothing",
        &["-s", "100", "-l", "out", "--dry-run", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("data/f60 -> out/0001"));
    assert!(result.stdout.contains("dry run: 5 links across 2 disks"));
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn json_manifest_is_one_document() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "json_manifest",
        &["--json", "-s", "100", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let doc: Value = serde_json::from_str(result.stdout.trim()).unwrap();
    assert_eq!(doc["disk_count"], 2);
    assert_eq!(doc["capacity"], 100);
    assert_eq!(doc["disks"][0]["files"][0]["path"], "data/f60");
    assert_eq!(doc["disks"][1]["free"], 40);
}

#[test]
fn output_format_env_selects_json() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());
    let result = run_cli_case_in(
        "output_format_env",
        &["-n", "-s", "100", "data"],
        Some(tmp.path()),
        &[("FIT_OUTPUT_FORMAT", "json")],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let doc: Value = serde_json::from_str(result.stdout.trim()).unwrap();
    assert_eq!(doc["command"], "count");
    assert_eq!(doc["disks"], 2);
}

#[test]
fn config_file_supplies_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());
    write_file(tmp.path(), "data/sub/f5", 5);
    fs::write(
        tmp.path().join("fit.toml"),
        "[disk]\nsize = \"100\"\n\n[collector]\nrecursive = true\n",
    )
    .unwrap();

    let result = run_cli_case_in(
        "config_file_supplies_defaults",
        &["--config", "fit.toml", "-n", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(result.stdout, "2 disks.\n");

    let missing = run_cli_case_in(
        "config_file_missing",
        &["--config", "absent.toml", "-s", "100", "data"],
        Some(tmp.path()),
        &[],
    );
    assert_eq!(missing.status.code(), Some(1), "log: {}", missing.log_path.display());
    assert!(missing.stderr.contains("missing configuration file"));
}

#[test]
fn size_flag_overrides_invalid_env_and_config_size() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let from_env = run_cli_case_in(
        "size_flag_overrides_invalid_env_size",
        &["-n", "-s", "1k", "data"],
        Some(tmp.path()),
        &[("FIT_DISK_SIZE", "bogus")],
    );
    assert!(from_env.status.success(), "log: {}", from_env.log_path.display());
    assert_eq!(from_env.stdout, "1 disk.\n");

    fs::write(tmp.path().join("fit.toml"), "[disk]\nsize = \"0\"\n").unwrap();
    let from_file = run_cli_case_in(
        "size_flag_overrides_zero_config_size",
        &["--config", "fit.toml", "-n", "-s", "1k", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(from_file.status.success(), "log: {}", from_file.log_path.display());
    assert_eq!(from_file.stdout, "1 disk.\n");

    let unresolved = run_cli_case_in(
        "invalid_env_size_without_flag",
        &["-n", "data"],
        Some(tmp.path()),
        &[("FIT_DISK_SIZE", "bogus")],
    );
    assert_eq!(unresolved.status.code(), Some(1), "log: {}", unresolved.log_path.display());
}

#[test]
fn activity_log_records_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    reference_tree(tmp.path());

    let result = run_cli_case_in(
        "activity_log_records_the_run",
        &["-s", "100", "-l", "out", "--log-file", "logs/fit.jsonl", "data"],
        Some(tmp.path()),
        &[],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let raw = fs::read_to_string(tmp.path().join("logs/fit.jsonl")).unwrap();
    let events: Vec<String> = raw
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        events,
        vec![
            "run_start",
            "collect_complete",
            "allocate_complete",
            "disk_linked",
            "disk_linked",
            "run_complete"
        ]
    );
}

#[test]
fn failed_run_logs_error_code() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("empty")).unwrap();
    let result = run_cli_case_in(
        "failed_run_logs_error_code",
        &["-s", "1g", "empty"],
        Some(tmp.path()),
        &[("FIT_LOG_FILE", "fit.jsonl")],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let raw = fs::read_to_string(tmp.path().join("fit.jsonl")).unwrap();
    let last: Value = serde_json::from_str(raw.lines().last().unwrap()).unwrap();
    assert_eq!(last["event"], "error");
    assert_eq!(last["error_code"], "FIT-2004");
}

#[test]
fn usage_errors_exit_with_clap_status() {
    let result = run_cli_case("usage_errors", &["-s", "1g"]);
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
}

#[test]
fn completions_are_generated() {
    let result = run_cli_case("completions_are_generated", &["--completions", "bash"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("fit"));
}
