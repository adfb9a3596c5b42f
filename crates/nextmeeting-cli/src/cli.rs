//! CLI argument definitions for nextmeeting.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Regenerate every tenant once and exit |
//! | `serve` | HTTP surface plus the periodic regeneration loop |
//! | `sources` | Show configured backends and test the source connection |
//! | `check` | Fetch and normalize one tenant, print the payload, publish nothing |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--log-level` | `info` | Default filter when `RUST_LOG` is unset |
//! | `--log-json` | `false` | Emit logs as JSON lines |
//!
//! Everything else is read from the environment (`MEETING_SOURCE`,
//! `STORAGE_BACKEND`, `TENANTS_FILE`, ...).

use clap::{Args, Parser, Subcommand};

/// NextMeeting schedule regeneration.
#[derive(Debug, Parser)]
#[command(
    name = "nextmeeting",
    author,
    version,
    about = "Regenerate and publish NextMeeting schedule sites"
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit structured JSON logs.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one regeneration across all tenants.
    Run,
    /// Serve /health and /trigger and regenerate periodically.
    Serve(ServeArgs),
    /// Show the configured backends and test the source connection.
    Sources,
    /// Fetch and normalize one tenant without publishing.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port to listen on; overrides PORT.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Tenant name as it appears in the tenant list.
    #[arg(long)]
    pub tenant: String,

    /// Pretty-print the payload.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}
