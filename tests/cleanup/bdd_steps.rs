//! BDD step definitions for cleanup behaviour.

use imgcull::test_support::FakeProvider;
use imgcull::{Cleaner, RetentionPolicy};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    CleanupContext, CleanupOutcome, image_aged, now, snapshot_of, split_list,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given(
    "a retention policy keeping {count:u32} images for {days:u32} days with {workers:u32} workers"
)]
fn retention_policy(
    mut cleanup_context: CleanupContext,
    count: u32,
    days: u32,
    workers: u32,
) -> CleanupContext {
    let policy = RetentionPolicy::new(count as usize, days)
        .with_workers(workers as usize)
        .unwrap_or_else(|err| panic!("retention policy should be valid: {err}"));
    cleanup_context.policy = Some(policy);
    cleanup_context
}

#[given(
    "an image \"{name}\" with id \"{id}\" created {age:u32} days ago with snapshot \"{snapshot}\""
)]
fn single_image(
    mut cleanup_context: CleanupContext,
    name: String,
    id: String,
    age: u32,
    snapshot: String,
) -> CleanupContext {
    cleanup_context
        .images
        .push(image_aged(name.trim(), id.trim(), age, snapshot.trim()));
    cleanup_context
}

#[given("{count:u32} images in group \"{group}\" created {age:u32} days ago")]
fn image_group(
    mut cleanup_context: CleanupContext,
    count: u32,
    group: String,
    age: u32,
) -> CleanupContext {
    let prefix = group.trim();
    for index in 1..=count {
        let id = format!("{prefix}-{index}");
        cleanup_context.images.push(image_aged(
            &format!("{prefix}.v{index}"),
            &id,
            age,
            &snapshot_of(&id),
        ));
    }
    cleanup_context
}

#[given("deregistration of image \"{id}\" fails")]
fn failing_deregistration(mut cleanup_context: CleanupContext, id: String) -> CleanupContext {
    cleanup_context.failing_images.push(id.trim().to_owned());
    cleanup_context
}

#[when("I run the cleanup")]
fn run_cleanup(mut cleanup_context: CleanupContext) -> CleanupContext {
    let policy = cleanup_context
        .policy
        .unwrap_or_else(|| panic!("test setup requires a retention policy"));
    let provider = FakeProvider::with_images(cleanup_context.images.clone());
    for id in &cleanup_context.failing_images {
        provider.fail_image(id);
    }

    let cleaner = Cleaner::at(provider.clone(), policy, now())
        .unwrap_or_else(|err| panic!("cleaner should start: {err}"));
    cleanup_context.outcome = Some(match cleaner.run() {
        Ok(report) => CleanupOutcome::Completed(report),
        Err(err) => CleanupOutcome::Aborted(err.to_string()),
    });
    cleanup_context.provider = provider;
    cleanup_context
}

fn outcome(cleanup_context: &CleanupContext) -> Result<&CleanupOutcome, StepError> {
    cleanup_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

#[then("the cleanup deletes images \"{names}\"")]
fn deletes_images(cleanup_context: &CleanupContext, names: String) -> Result<(), StepError> {
    let CleanupOutcome::Completed(report) = outcome(cleanup_context)? else {
        return Err(StepError::Assertion(format!(
            "expected a completed run, got {:?}",
            cleanup_context.outcome
        )));
    };
    let expected = split_list(&names);
    if report.succeeded == expected && report.failed.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected deleted images {expected:?}, got {report:?}"
        )))
    }
}

#[then("snapshots \"{ids}\" are deleted")]
fn snapshots_deleted(cleanup_context: &CleanupContext, ids: String) -> Result<(), StepError> {
    let mut expected = split_list(&ids);
    expected.sort();
    let mut deleted = cleanup_context.provider.deleted_snapshots();
    deleted.sort();
    if deleted == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected snapshots {expected:?}, got {deleted:?}"
        )))
    }
}

#[then("the cleanup fails with \"{message}\"")]
fn cleanup_fails(cleanup_context: &CleanupContext, message: String) -> Result<(), StepError> {
    let actual = match outcome(cleanup_context)? {
        CleanupOutcome::Aborted(actual) => actual.clone(),
        CleanupOutcome::Completed(report) => match report.clone().into_result() {
            Ok(deleted) => {
                return Err(StepError::Assertion(format!(
                    "expected cleanup to fail, deleted {deleted:?}"
                )));
            }
            Err(err) => err.to_string(),
        },
    };
    if actual.contains(message.trim()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure mentioning '{message}', got: {actual}"
        )))
    }
}

#[then("{count:u32} images were deregistered")]
fn images_deregistered(cleanup_context: &CleanupContext, count: u32) -> Result<(), StepError> {
    let deregistered = cleanup_context.provider.deregistered();
    if deregistered.len() == count as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} deregistrations, got {deregistered:?}"
        )))
    }
}

#[then("no snapshot of image \"{id}\" is deleted")]
fn snapshot_kept(cleanup_context: &CleanupContext, id: String) -> Result<(), StepError> {
    let snapshot = snapshot_of(id.trim());
    if cleanup_context
        .provider
        .deleted_snapshots()
        .contains(&snapshot)
    {
        Err(StepError::Assertion(format!(
            "snapshot {snapshot} of a failed image was deleted"
        )))
    } else {
        Ok(())
    }
}

#[then("no image is deregistered")]
fn nothing_deregistered(cleanup_context: &CleanupContext) -> Result<(), StepError> {
    let deregistered = cleanup_context.provider.deregistered();
    if deregistered.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no deregistrations, got {deregistered:?}"
        )))
    }
}
