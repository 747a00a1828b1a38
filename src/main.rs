//! Binary entry point for the `imgcull` CLI.
//!
//! Loads configuration, lists the caller's Scaleway images through `scw`,
//! and deletes the ones that fall outside the retention policy. Exits with
//! status 1 when the run cannot start or aborts, and 2 when some images
//! could not be fully deleted.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use imgcull::{
    Cleaner, CleanupConfig, CleanupError, ConfigError, ConfigOverrides, DeletionReport,
    ScwImageProvider,
};

mod cli;

use cli::Cli;

const EXIT_FAILURE: i32 = 1;
const EXIT_INCOMPLETE: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(&cli).and_then(|report| finish(io::stdout(), report)) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            EXIT_FAILURE
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn overrides(cli: &Cli) -> ConfigOverrides {
    ConfigOverrides {
        retain_count: cli.retain_count,
        retain_days: cli.retain_days,
        workers: cli.workers,
        zone: cli.zone.clone(),
        project_id: cli.project_id.clone(),
        profile: cli.profile.clone(),
        scw_bin: cli.scw_bin.clone(),
    }
}

fn run(cli: &Cli) -> Result<DeletionReport, CliError> {
    let config = CleanupConfig::load_without_cli_args()?.with_overrides(overrides(cli));
    let policy = config.policy()?;
    let provider = ScwImageProvider::with_process_runner(config.scw_target());
    let report = Cleaner::new(provider, policy)?.run()?;
    Ok(report)
}

/// Prints deleted images and the summary, returning the exit status.
fn finish(mut out: impl Write, report: DeletionReport) -> Result<i32, CliError> {
    for name in &report.succeeded {
        writeln!(out, "deleted {name}")?;
    }
    writeln!(
        out,
        "cleanup complete: deleted_images={}, failed_images={}",
        report.succeeded.len(),
        report.failed.len()
    )?;

    match report.into_result() {
        Ok(_) => Ok(0),
        Err(err) => {
            report_error(&CliError::Cleanup(err));
            Ok(EXIT_INCOMPLETE)
        }
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
    if let CliError::Cleanup(CleanupError::Incomplete { failed, .. }) = err {
        for failure in failed {
            for step in &failure.failures {
                writeln!(
                    target,
                    "  {} ({:?} {}): {}",
                    failure.name, step.stage, step.resource_id, step.error
                )
                .ok();
            }
        }
    }
}
