//! Config file, flag, and fallback resolution.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use herald::cli::Cli;
use herald::config::{self, ConfigError};

fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herald.toml");
    std::fs::write(&path, body).unwrap();
    (dir, path)
}

#[test]
fn file_values_fill_unset_flags() {
    let (_dir, path) = write_config(
        r#"
manifests = "deploy/comments"
target = "octo/hello#42"
dry_run = true

[controller]
workers = 4
base_delay_ms = 100
"#,
    );
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let config = config::resolve(&cli, None).unwrap();
    assert_eq!(config.manifests, PathBuf::from("deploy/comments"));
    assert_eq!(config.target.as_ref().unwrap().to_string(), "octo/hello#42");

    let controller = config.controller_config();
    assert_eq!(controller.workers, 4);
    assert_eq!(controller.base_delay, Duration::from_millis(100));
    assert_eq!(controller.max_delay, Duration::from_secs(60));
}

#[test]
fn flags_override_file() {
    let (_dir, path) = write_config(
        r#"
target = "octo/hello#42"

[controller]
workers = 4
"#,
    );
    let cli = Cli {
        config: Some(path),
        target: Some("octo/other#7".parse().unwrap()),
        workers: Some(2),
        token: Some("from-flag".to_string()),
        ..Cli::default()
    };

    let config = config::resolve(&cli, Some("from-env".to_string())).unwrap();
    assert_eq!(config.target.as_ref().unwrap().number, 7);
    assert_eq!(config.controller.workers, 2);
    assert_eq!(config.github.token.as_deref(), Some("from-flag"));
}

#[test]
fn token_falls_back_to_secondary_variable() {
    let (_dir, path) = write_config("target = \"octo/hello#1\"\n");
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let config = config::resolve(&cli, Some("fallback".to_string())).unwrap();
    assert_eq!(config.github.token.as_deref(), Some("fallback"));
}

#[test]
fn missing_token_is_rejected_without_dry_run() {
    let (_dir, path) = write_config("target = \"octo/hello#1\"\n");
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let err = config::resolve(&cli, None).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("token"));
}

#[test]
fn zero_workers_is_rejected() {
    let (_dir, path) = write_config("target = \"octo/hello#1\"\ndry_run = true\n");
    let cli = Cli {
        config: Some(path),
        workers: Some(0),
        ..Cli::default()
    };

    assert!(config::resolve(&cli, None).is_err());
}

#[test]
fn zero_base_delay_is_rejected() {
    let (_dir, path) = write_config(
        "target = \"octo/hello#1\"\ndry_run = true\n\n[controller]\nbase_delay_ms = 0\n",
    );
    let cli = Cli {
        config: Some(path),
        ..Cli::default()
    };

    let err = config::resolve(&cli, None).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("base delay"));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Cli {
        config: Some(dir.path().join("absent.toml")),
        dry_run: true,
        ..Cli::default()
    };

    let err = config::resolve(&cli, None).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn unknown_keys_are_parse_errors() {
    let (_dir, path) = write_config("target = \"octo/hello#1\"\nwokers = 3\n");
    let err = config::load_toml_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn cli_parses_target_and_durations() {
    let cli = Cli::try_parse_from([
        "herald",
        "--target",
        "octo/repo#9",
        "--workers",
        "3",
        "--resync-secs",
        "0",
        "--base-delay-ms",
        "250",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(cli.target.unwrap().number, 9);
    assert_eq!(cli.workers, Some(3));
    assert_eq!(cli.resync_secs, Some(0));
    assert_eq!(cli.base_delay_ms, Some(250));
    assert!(cli.dry_run);
}

#[test]
fn cli_rejects_malformed_target() {
    assert!(Cli::try_parse_from(["herald", "--target", "octo/repo"]).is_err());
}
