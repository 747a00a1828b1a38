//! Scaleway image provider driven through the `scw` CLI.
//!
//! Images are listed with `scw instance image list`, deregistered with
//! `scw instance image delete` (which leaves snapshots in place) and their
//! snapshots removed one by one with `scw instance snapshot delete`.

use std::ffi::OsString;

use serde_json::Value;

use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::image::ImageDescriptor;
use crate::provider::{ImageProvider, ProviderError};

mod types;

use types::ScwImage;

/// Default Scaleway CLI binary name.
pub const DEFAULT_SCW_BIN: &str = "scw";

/// Default zone inspected when none is configured.
pub const DEFAULT_ZONE: &str = "fr-par-1";

/// Where and how the `scw` CLI is invoked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScwTarget {
    /// Path to the `scw` CLI binary.
    pub scw_bin: String,
    /// Zone whose images are cleaned.
    pub zone: String,
    /// Optional project restricting the image listing.
    pub project_id: Option<String>,
    /// Optional CLI profile selecting non-default credentials.
    pub profile: Option<String>,
}

impl ScwTarget {
    /// Creates a target for `zone` using the default binary and credentials.
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            scw_bin: String::from(DEFAULT_SCW_BIN),
            zone: zone.into().trim().to_owned(),
            project_id: None,
            profile: None,
        }
    }

    /// Overrides the CLI binary.
    #[must_use]
    pub fn scw_bin(mut self, value: impl Into<String>) -> Self {
        self.scw_bin = value.into().trim().to_owned();
        self
    }

    /// Restricts listing to a project.
    #[must_use]
    pub fn project_id(mut self, value: Option<String>) -> Self {
        self.project_id = value.map(|id| id.trim().to_owned());
        self
    }

    /// Selects a credentials profile.
    #[must_use]
    pub fn profile(mut self, value: Option<String>) -> Self {
        self.profile = value.map(|name| name.trim().to_owned());
        self
    }
}

/// [`ImageProvider`] backed by the Scaleway CLI.
#[derive(Clone, Debug)]
pub struct ScwImageProvider<R: CommandRunner> {
    target: ScwTarget,
    runner: R,
}

impl ScwImageProvider<ProcessCommandRunner> {
    /// Creates a provider wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(target: ScwTarget) -> Self {
        Self::new(target, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> ScwImageProvider<R> {
    /// Creates a provider using the given target and runner.
    #[must_use]
    pub const fn new(target: ScwTarget, runner: R) -> Self {
        Self { target, runner }
    }

    /// Returns the target this provider talks to.
    #[must_use]
    pub const fn target(&self) -> &ScwTarget {
        &self.target
    }

    /// Builds an argument vector: global flags, the subcommand path, then
    /// the zone and any extra arguments.
    fn build_args(&self, subcommand_path: &[&str], extra: &[String]) -> Vec<OsString> {
        let mut args = Vec::new();

        if let Some(profile) = &self.target.profile {
            args.push(OsString::from("--profile"));
            args.push(OsString::from(profile));
        }
        for part in subcommand_path {
            args.push(OsString::from(*part));
        }
        for arg in extra {
            args.push(OsString::from(arg));
        }
        args.push(OsString::from(format!("zone={}", self.target.zone)));

        args
    }

    fn run_scw(&self, args: &[OsString], action: &str) -> Result<CommandOutput, ProviderError> {
        tracing::debug!(program = %self.target.scw_bin, action, "invoking scw");
        let output = self.runner.run(&self.target.scw_bin, args)?;
        if output.is_success() {
            return Ok(output);
        }

        Err(ProviderError::CommandFailure {
            program: self.target.scw_bin.clone(),
            action: action.to_owned(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr,
        })
    }
}

impl<R: CommandRunner> ImageProvider for ScwImageProvider<R> {
    fn list_owned_images(&self) -> Result<Vec<ImageDescriptor>, ProviderError> {
        let mut extra = vec![String::from("public=false")];
        if let Some(project_id) = &self.target.project_id {
            extra.push(format!("project-id={project_id}"));
        }
        let mut args = self.build_args(&["instance", "image", "list"], &extra);
        args.push(OsString::from("-o"));
        args.push(OsString::from("json"));

        let output = self.run_scw(&args, "image list")?;
        let images = parse_images(&output.stdout)?;
        Ok(images.into_iter().map(ScwImage::into_descriptor).collect())
    }

    fn deregister_image(&self, image_id: &str) -> Result<(), ProviderError> {
        let args = self.build_args(&["instance", "image", "delete", image_id], &[]);
        self.run_scw(&args, "image delete").map(drop)
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        let args = self.build_args(&["instance", "snapshot", "delete", snapshot_id], &[]);
        self.run_scw(&args, "snapshot delete").map(drop)
    }
}

/// Parses image list output, accepting either a bare array or an object
/// wrapping the array in an `images` field.
fn parse_images(stdout: &str) -> Result<Vec<ScwImage>, ProviderError> {
    let parse_error = |message: String| ProviderError::Parse {
        resource: String::from("images"),
        message,
    };

    let value: Value = serde_json::from_str(stdout).map_err(|err| parse_error(err.to_string()))?;
    let items = match value {
        items @ Value::Array(_) => items,
        Value::Object(mut fields) => fields
            .remove("images")
            .ok_or_else(|| parse_error(String::from("missing 'images' field")))?,
        _ => return Err(parse_error(String::from("unexpected JSON shape"))),
    };
    serde_json::from_value(items).map_err(|err| parse_error(err.to_string()))
}
