//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::policy::{DEFAULT_WORKERS, PolicyError, RetentionPolicy};
use crate::scaleway::{DEFAULT_SCW_BIN, DEFAULT_ZONE, ScwTarget};

/// Cleanup settings derived from environment variables and configuration
/// files, optionally overridden from the command line.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "IMGCULL",
    discovery(
        app_name = "imgcull",
        env_var = "IMGCULL_CONFIG_PATH",
        config_file_name = "imgcull.toml",
        dotfile_name = ".imgcull.toml",
        project_file_name = "imgcull.toml"
    )
)]
pub struct CleanupConfig {
    /// Most recent images kept per group regardless of age. Required.
    pub retain_count: Option<usize>,
    /// Age in days after which unprotected images are deleted. Required.
    pub retain_days: Option<u32>,
    /// Number of concurrent deletion workers. Defaults to 10.
    #[ortho_config(default = DEFAULT_WORKERS.get())]
    pub workers: usize,
    /// Scaleway zone whose images are cleaned. Defaults to `fr-par-1`.
    #[ortho_config(default = DEFAULT_ZONE.to_owned())]
    pub zone: String,
    /// Project restricting the image listing.
    pub project_id: Option<String>,
    /// `scw` profile holding the credentials to use.
    pub profile: Option<String>,
    /// Path to the `scw` executable.
    #[ortho_config(default = DEFAULT_SCW_BIN.to_owned())]
    pub scw_bin: String,
}

/// Values supplied on the command line that take precedence over files and
/// environment variables.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOverrides {
    /// Overrides [`CleanupConfig::retain_count`].
    pub retain_count: Option<usize>,
    /// Overrides [`CleanupConfig::retain_days`].
    pub retain_days: Option<u32>,
    /// Overrides [`CleanupConfig::workers`].
    pub workers: Option<usize>,
    /// Overrides [`CleanupConfig::zone`].
    pub zone: Option<String>,
    /// Overrides [`CleanupConfig::project_id`].
    pub project_id: Option<String>,
    /// Overrides [`CleanupConfig::profile`].
    pub profile: Option<String>,
    /// Overrides [`CleanupConfig::scw_bin`].
    pub scw_bin: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to imgcull.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const RETAIN_COUNT: FieldMetadata = FieldMetadata::new(
    "number of images to retain per group",
    "IMGCULL_RETAIN_COUNT",
    "retain_count",
);
const RETAIN_DAYS: FieldMetadata = FieldMetadata::new(
    "retention age in days",
    "IMGCULL_RETAIN_DAYS",
    "retain_days",
);
const ZONE: FieldMetadata = FieldMetadata::new("Scaleway zone", "IMGCULL_ZONE", "zone");
const SCW_BIN: FieldMetadata = FieldMetadata::new("scw binary", "IMGCULL_SCW_BIN", "scw_bin");

impl CleanupConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("imgcull")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(count) = overrides.retain_count {
            self.retain_count = Some(count);
        }
        if let Some(days) = overrides.retain_days {
            self.retain_days = Some(days);
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(zone) = overrides.zone {
            self.zone = zone;
        }
        if overrides.project_id.is_some() {
            self.project_id = overrides.project_id;
        }
        if overrides.profile.is_some() {
            self.profile = overrides.profile;
        }
        if let Some(scw_bin) = overrides.scw_bin {
            self.scw_bin = scw_bin;
        }
        self
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide missing values via environment variables or configuration
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is absent
    /// or blank and [`ConfigError::Invalid`] when the worker count is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retain_count.is_none() {
            return Err(RETAIN_COUNT.missing());
        }
        if self.retain_days.is_none() {
            return Err(RETAIN_DAYS.missing());
        }
        if self.zone.trim().is_empty() {
            return Err(ZONE.missing());
        }
        if self.scw_bin.trim().is_empty() {
            return Err(SCW_BIN.missing());
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid(PolicyError::NoWorkers));
        }
        Ok(())
    }

    /// Builds the retention policy described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn policy(&self) -> Result<RetentionPolicy, ConfigError> {
        self.validate()?;
        let (Some(retain_count), Some(retain_days)) = (self.retain_count, self.retain_days) else {
            return Err(RETAIN_COUNT.missing());
        };
        RetentionPolicy::new(retain_count, retain_days)
            .with_workers(self.workers)
            .map_err(ConfigError::Invalid)
    }

    /// Builds the `scw` invocation target.
    ///
    /// Blank optional values are treated as unset.
    #[must_use]
    pub fn scw_target(&self) -> ScwTarget {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(str::to_owned)
        };
        ScwTarget::new(&self.zone)
            .scw_bin(&self.scw_bin)
            .project_id(non_blank(&self.project_id))
            .profile(non_blank(&self.profile))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value that cannot form a retention policy.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] PolicyError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
