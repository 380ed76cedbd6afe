//! CLI definition using clap.

use std::path::PathBuf;

use clap::Parser;
use herald_github::IssueRef;
use url::Url;

/// Herald - deliver Comment resources as GitHub issue comments
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "herald")]
#[command(version)]
#[command(about = "Level-triggered controller that posts Comment resources to a GitHub issue")]
#[command(
    long_about = "Herald loads Comment manifests from a directory, watches it for changes, and posts every comment whose status does not yet record delivery on the target issue."
)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(short, long, env = "HERALD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of Comment manifests
    #[arg(short, long)]
    pub manifests: Option<PathBuf>,

    /// File the store persists its state to
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// GitHub token (falls back to TOKEN)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Issue to comment on, as owner/repo#number
    #[arg(short, long)]
    pub target: Option<IssueRef>,

    /// Concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Seconds between informer resyncs (0 disables)
    #[arg(long)]
    pub resync_secs: Option<u64>,

    /// Backoff after the first failure, in milliseconds
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Backoff ceiling, in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Deadline for each GitHub call and status update, in seconds
    #[arg(long)]
    pub call_timeout_secs: Option<u64>,

    /// GitHub API root (for GitHub Enterprise)
    #[arg(long)]
    pub api_base: Option<Url>,

    /// Log comments instead of posting them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Log filter used when RUST_LOG is unset (e.g. info, herald=debug)
    #[arg(long)]
    pub log_level: Option<String>,
}
