//! BDD scenarios for image runs.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RollerContext, roller_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A fresh image leaves the server untouched"
)]
fn scenario_fresh_image(roller_context: RollerContext) {
    let _ = roller_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A stale image is replaced and pruned"
)]
fn scenario_stale_image(roller_context: RollerContext) {
    let _ = roller_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A save that outlives its timeout is reported and left alone"
)]
fn scenario_save_timeout(roller_context: RollerContext) {
    let _ = roller_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "One failing server does not affect the others"
)]
fn scenario_isolation(roller_context: RollerContext) {
    let _ = roller_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Failed authentication aborts the whole run"
)]
fn scenario_auth_failure(roller_context: RollerContext) {
    let _ = roller_context;
}
