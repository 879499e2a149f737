//! Command-line interface definitions for the `imageroller` binary.
//!
//! This module centralises the clap parser so both the main binary and the
//! build script can reuse it when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `imageroller` binary.
#[derive(Debug, Parser)]
#[command(
    name = "imageroller",
    about = "Create rolling server images and prune those past retention",
    version
)]
pub(crate) struct Cli {
    /// Fleet configuration file (overrides `IMAGEROLLER_FLEET_CONFIG`).
    #[arg(short, long, value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Credentials file (overrides `IMAGEROLLER_AUTH_CONFIG`).
    #[arg(short, long, value_name = "PATH")]
    pub(crate) auth_config: Option<String>,
    /// Process only this server, even when its section is disabled.
    #[arg(short, long, value_name = "NAME")]
    pub(crate) server: Option<String>,
    /// Create an image even when a fresh one exists.
    ///
    /// A server with an image still saving is never given a second one.
    #[arg(short, long)]
    pub(crate) force: bool,
    /// Log filter used when `RUST_LOG` is unset (for example `debug`).
    #[arg(long, value_name = "LEVEL")]
    pub(crate) log_level: Option<String>,
}
