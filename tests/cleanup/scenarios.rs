//! BDD scenarios for retention cleanup.

use rstest_bdd_macros::scenario;

use super::test_helpers::{CleanupContext, cleanup_context};

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Delete aged images outside the retained window"
)]
fn scenario_delete_aged_images(cleanup_context: CleanupContext) {
    let _ = cleanup_context;
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Keep young images even when they fall outside the retained window"
)]
fn scenario_keep_young_images(cleanup_context: CleanupContext) {
    let _ = cleanup_context;
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Report images that could not be deregistered"
)]
fn scenario_report_failed_images(cleanup_context: CleanupContext) {
    let _ = cleanup_context;
}

#[scenario(
    path = "tests/features/cleanup.feature",
    name = "Reject an inventory containing an ungrouped name"
)]
fn scenario_reject_ungrouped_name(cleanup_context: CleanupContext) {
    let _ = cleanup_context;
}
