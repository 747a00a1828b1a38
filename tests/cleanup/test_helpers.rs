//! Shared fixtures and helpers for cleanup BDD scenarios.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use imgcull::test_support::FakeProvider;
use imgcull::{BlockDeviceMapping, DeletionReport, ImageDescriptor, RetentionPolicy};
use rstest::fixture;

#[derive(Clone, Debug)]
pub enum CleanupOutcome {
    Completed(DeletionReport),
    Aborted(String),
}

#[derive(Clone, Debug)]
pub struct CleanupContext {
    pub policy: Option<RetentionPolicy>,
    pub images: Vec<ImageDescriptor>,
    pub failing_images: Vec<String>,
    pub provider: FakeProvider,
    pub outcome: Option<CleanupOutcome>,
}

#[fixture]
pub fn cleanup_context() -> CleanupContext {
    CleanupContext {
        policy: None,
        images: Vec::new(),
        failing_images: Vec::new(),
        provider: FakeProvider::default(),
        outcome: None,
    }
}

/// Fixed evaluation time for every scenario.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("reference timestamp should be valid"))
}

pub fn image_aged(name: &str, id: &str, age_days: u32, snapshot: &str) -> ImageDescriptor {
    ImageDescriptor::new(name, id, now() - TimeDelta::days(i64::from(age_days)))
        .with_mapping(BlockDeviceMapping::with_snapshot("root", snapshot))
}

/// Snapshot id backing the image `id` in generated groups.
pub fn snapshot_of(id: &str) -> String {
    format!("snap-{id}")
}

pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
