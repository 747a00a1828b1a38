//! Core library for the `imgcull` image retention tool.
//!
//! The crate selects machine images that fall outside a retention policy
//! (keep the newest N per name group, delete the rest once they are old
//! enough) and deletes them, together with their backing snapshots, through
//! a bounded pool of worker threads. Scaleway is supported through the `scw`
//! CLI; other providers plug in via [`ImageProvider`].

pub mod cleaner;
pub mod command;
pub mod config;
pub mod image;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod scaleway;
pub mod select;
pub mod test_support;

pub use cleaner::{Cleaner, CleanupError};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{CleanupConfig, ConfigError, ConfigOverrides};
pub use image::{BlockDeviceMapping, GROUP_DELIMITER, ImageDescriptor};
pub use pipeline::{DeletionPipeline, DeletionReport, FailedDeletion, JobStage, PipelineError};
pub use policy::{DEFAULT_WORKERS, PolicyError, RetentionPolicy};
pub use provider::{ImageProvider, ProviderError};
pub use scaleway::{DEFAULT_SCW_BIN, DEFAULT_ZONE, ScwImageProvider, ScwTarget};
pub use select::{SelectError, select};
