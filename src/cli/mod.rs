//! Command-line interface definitions for the `imgcull` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `imgcull` binary.
///
/// Every flag overrides the matching value from `imgcull.toml` or the
/// `IMGCULL_*` environment variables.
#[derive(Debug, Parser)]
#[command(
    name = "imgcull",
    about = "Delete aged Scaleway images and their snapshots under a retention policy"
)]
pub(crate) struct Cli {
    /// Number of most recent images kept in every name group regardless of
    /// age.
    #[arg(long, value_name = "COUNT")]
    pub(crate) retain_count: Option<usize>,
    /// Age in days an image outside the retained window must reach before it
    /// is deleted.
    #[arg(long, value_name = "DAYS")]
    pub(crate) retain_days: Option<u32>,
    /// Number of images deleted concurrently (default 10).
    #[arg(long, value_name = "COUNT")]
    pub(crate) workers: Option<usize>,
    /// Scaleway zone to clean (default fr-par-1).
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Only consider images belonging to this project.
    #[arg(long, value_name = "ID")]
    pub(crate) project_id: Option<String>,
    /// `scw` profile providing credentials.
    #[arg(long, value_name = "NAME")]
    pub(crate) profile: Option<String>,
    /// Path to the Scaleway CLI binary.
    #[arg(long, value_name = "PATH")]
    pub(crate) scw_bin: Option<String>,
    /// Log each deregistration and snapshot deletion.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}
