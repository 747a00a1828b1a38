//! End-to-end cleanup run: list, select, delete.
//!
//! A [`Cleaner`] freezes "now" and starts its worker pool when it is built.
//! [`Cleaner::run`] lists the caller's images, selects deletion candidates
//! and drains them through the pool. Listing and selection failures abort
//! before any image is touched; provider failures during deletion are
//! collected in the returned [`DeletionReport`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::image::ImageDescriptor;
use crate::pipeline::{DeletionPipeline, DeletionReport, FailedDeletion, PipelineError};
use crate::policy::RetentionPolicy;
use crate::provider::{ImageProvider, ProviderError};
use crate::select::{SelectError, select};

/// Errors returned by a cleanup run.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CleanupError {
    /// Raised when the image inventory cannot be fetched.
    #[error("failed to list owned images: {0}")]
    List(#[source] ProviderError),
    /// Raised when the inventory is rejected before deletion.
    #[error("image selection rejected: {0}")]
    Select(#[from] SelectError),
    /// Raised when the worker pool breaks.
    #[error("deletion pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
    /// Raised when some selected images could not be fully deleted.
    #[error("{message}")]
    Incomplete {
        /// Human-readable summary naming the failed images.
        message: String,
        /// Names of fully deleted images.
        succeeded: Vec<String>,
        /// Images with failed steps.
        failed: Vec<FailedDeletion>,
    },
}

impl DeletionReport {
    /// Converts the report into the names of deleted images, or
    /// [`CleanupError::Incomplete`] when any image failed.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Incomplete`] when `failed` is not empty.
    pub fn into_result(self) -> Result<Vec<String>, CleanupError> {
        if self.failed.is_empty() {
            return Ok(self.succeeded);
        }

        let names = self
            .failed
            .iter()
            .map(|failure| failure.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(CleanupError::Incomplete {
            message: format!(
                "{} of {} images were not fully deleted: {names}",
                self.failed.len(),
                self.processed.len()
            ),
            succeeded: self.succeeded,
            failed: self.failed,
        })
    }
}

/// Applies a [`RetentionPolicy`] to the images of one provider.
#[derive(Debug)]
pub struct Cleaner<P: ImageProvider + 'static> {
    provider: Arc<P>,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
    pipeline: DeletionPipeline,
}

impl<P: ImageProvider + 'static> Cleaner<P> {
    /// Creates a cleaner evaluated against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Pipeline`] when the worker pool cannot start.
    pub fn new(provider: P, policy: RetentionPolicy) -> Result<Self, CleanupError> {
        Self::at(provider, policy, Utc::now())
    }

    /// Creates a cleaner whose cutoff is computed from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Pipeline`] when the worker pool cannot start.
    pub fn at(
        provider: P,
        policy: RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, CleanupError> {
        let provider = Arc::new(provider);
        let pipeline = DeletionPipeline::start(Arc::clone(&provider), policy.workers)?;
        Ok(Self {
            provider,
            policy,
            now,
            pipeline,
        })
    }

    /// Returns the policy this cleaner applies.
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Lists, selects and deletes, returning the per-image outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::List`] or [`CleanupError::Select`] before any
    /// deletion happens, and [`CleanupError::Pipeline`] when the pool
    /// breaks. Individual deletion failures are reported in the
    /// [`DeletionReport`].
    pub fn run(self) -> Result<DeletionReport, CleanupError> {
        let Self {
            provider,
            policy,
            now,
            pipeline,
        } = self;

        let selected = match Self::plan(provider.as_ref(), &policy, now) {
            Ok(selected) => selected,
            Err(err) => {
                pipeline.shutdown()?;
                return Err(err);
            }
        };

        let report = pipeline.run(selected)?;
        tracing::info!(
            deleted = report.succeeded.len(),
            failed = report.failed.len(),
            "cleanup finished"
        );
        Ok(report)
    }

    fn plan(
        provider: &P,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImageDescriptor>, CleanupError> {
        let images = provider.list_owned_images().map_err(CleanupError::List)?;
        let selected = select(&images, policy, now)?;
        tracing::info!(
            owned = images.len(),
            selected = selected.len(),
            retain_count = policy.retain_count,
            retain_days = policy.retain_days,
            "selected images for deletion"
        );
        Ok(selected)
    }
}
