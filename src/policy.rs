//! Retention policy applied to every image group during a run.

use std::num::NonZeroUsize;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use thiserror::Error;

/// Worker pool size used when none is configured.
pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(count) => count,
    None => NonZeroUsize::MIN,
};

/// Digits of fractional seconds kept in the cutoff timestamp.
const CUTOFF_SUBSEC_DIGITS: u16 = 3;

/// Dual retention policy: a per-group protected window plus an age cutoff.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetentionPolicy {
    /// Most recent images per group that are never deleted.
    pub retain_count: usize,
    /// Age in days an unprotected image must reach before it is deleted.
    pub retain_days: u32,
    /// Size of the deletion worker pool.
    pub workers: NonZeroUsize,
}

impl RetentionPolicy {
    /// Creates a policy using [`DEFAULT_WORKERS`].
    #[must_use]
    pub const fn new(retain_count: usize, retain_days: u32) -> Self {
        Self {
            retain_count,
            retain_days,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Overrides the worker pool size.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NoWorkers`] when `workers` is zero.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, PolicyError> {
        self.workers = NonZeroUsize::new(workers).ok_or(PolicyError::NoWorkers)?;
        Ok(self)
    }

    /// Computes the absolute cutoff for a run starting at `now`.
    ///
    /// The result is truncated to whole milliseconds. Truncation only ever
    /// moves the cutoff earlier, so later `now` values never yield an earlier
    /// cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::CutoffOutOfRange`] when `retain_days` reaches
    /// past the representable calendar.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, PolicyError> {
        TimeDelta::try_days(i64::from(self.retain_days))
            .and_then(|age| now.checked_sub_signed(age))
            .map(|cutoff| cutoff.trunc_subsecs(CUTOFF_SUBSEC_DIGITS))
            .ok_or(PolicyError::CutoffOutOfRange {
                retain_days: self.retain_days,
            })
    }
}

/// Errors raised while building or applying a retention policy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PolicyError {
    /// Raised when the worker pool would be empty.
    #[error("worker count must be at least 1")]
    NoWorkers,
    /// Raised when the cutoff cannot be represented.
    #[error("retain_days {retain_days} reaches past the representable calendar")]
    CutoffOutOfRange {
        /// Offending age threshold.
        retain_days: u32,
    },
}
