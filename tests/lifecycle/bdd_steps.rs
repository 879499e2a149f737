//! BDD step definitions for image runs.

use imageroller::test_support::{ProviderCall, image};
use imageroller::{Credentials, OutcomeStatus, Scheduler};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Builder;

use super::test_helpers::{POLL_INTERVAL, RollerContext, RunResult};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a server \"{name}\" retaining images for {minutes:u32} minutes")]
fn configured_server(mut roller_context: RollerContext, name: String, minutes: u32) -> RollerContext {
    roller_context.add_server(name.trim(), u64::from(minutes));
    roller_context
}

#[given("an active image \"{image_id}\" on \"{server}\" updated {minutes:u32} minutes ago")]
fn existing_image(
    roller_context: RollerContext,
    image_id: String,
    server: String,
    minutes: u32,
) -> RollerContext {
    roller_context
        .provider
        .add_image(server.trim(), image(image_id.trim(), i64::from(minutes), true));
    roller_context
}

#[given("new images on \"{server}\" never finish saving")]
fn never_saves(roller_context: RollerContext, server: String) -> RollerContext {
    roller_context
        .provider
        .set_polls_until_active(server.trim(), None);
    roller_context
}

#[given("{count:u32} servers each holding an image {minutes:u32} minutes old")]
fn fleet_with_stale_images(
    mut roller_context: RollerContext,
    count: u32,
    minutes: u32,
) -> RollerContext {
    for index in 1..=count {
        let name = format!("server{index}.example.com");
        roller_context.add_server(&name, 1440);
        roller_context.provider.add_image(
            &name,
            image(&format!("img-old-{index}"), i64::from(minutes), true),
        );
    }
    roller_context
}

#[given("image creation fails for \"{server}\"")]
fn creation_fails(roller_context: RollerContext, server: String) -> RollerContext {
    roller_context.provider.fail_create(server.trim());
    roller_context
}

#[given("authentication fails")]
fn authentication_fails(roller_context: RollerContext) -> RollerContext {
    roller_context.provider.fail_authentication();
    roller_context
}

#[when("the image run executes with {workers:u32} workers")]
fn run_images(mut roller_context: RollerContext, workers: u32) -> Result<RollerContext, StepError> {
    let runtime = Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    let worker_count =
        usize::try_from(workers).map_err(|err| StepError::Assertion(err.to_string()))?;
    let scheduler = Scheduler::new(
        roller_context.provider.clone(),
        roller_context.observer.clone(),
        worker_count,
    )
    .map_err(|err| StepError::Assertion(err.to_string()))?
    .with_poll_interval(POLL_INTERVAL);

    let servers = roller_context.servers.clone();
    let result = runtime.block_on(async move {
        scheduler
            .run(&Credentials::new("ops", "key"), &servers)
            .await
    });
    roller_context.result = Some(match result {
        Ok(report) => RunResult::Completed(report),
        Err(err) => RunResult::Aborted(err.to_string()),
    });
    Ok(roller_context)
}

fn parse_status(label: &str) -> Result<OutcomeStatus, StepError> {
    match label.trim() {
        "SUCCESS" => Ok(OutcomeStatus::Success),
        "TIMEOUT" => Ok(OutcomeStatus::Timeout),
        "ERROR" => Ok(OutcomeStatus::Error),
        other => Err(StepError::Assertion(format!("unknown status {other}"))),
    }
}

#[then("the outcome for \"{server}\" is \"{status}\"")]
fn outcome_is(roller_context: &RollerContext, server: String, status: String) -> Result<(), StepError> {
    let expected = parse_status(&status)?;
    let report = roller_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("run did not complete")))?;
    let outcome = report
        .outcome_for(server.trim())
        .ok_or_else(|| StepError::Assertion(format!("no outcome for {server}")))?;
    if outcome.status == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {expected}, got {outcome}")))
    }
}

#[then("{count:u32} servers report \"{status}\"")]
fn servers_report(roller_context: &RollerContext, count: u32, status: String) -> Result<(), StepError> {
    let expected = parse_status(&status)?;
    let report = roller_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("run did not complete")))?;
    let actual = report.count(expected);
    if usize::try_from(count).is_ok_and(|expected_count| expected_count == actual) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} servers with {expected}, got {actual}: {report:?}"
        )))
    }
}

#[then("no provider writes were issued")]
fn no_writes(roller_context: &RollerContext) -> Result<(), StepError> {
    let writes = roller_context.provider.write_count();
    if writes == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected no writes, saw {writes}")))
    }
}

#[then("a new image was requested for \"{server}\"")]
fn image_requested(roller_context: &RollerContext, server: String) -> Result<(), StepError> {
    let server_id = format!("srv-{}", server.trim());
    let creates = roller_context
        .provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ProviderCall::Create { server_id: id, .. } if *id == server_id))
        .count();
    if creates == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exactly one create for {server}, saw {creates}"
        )))
    }
}

#[then("image \"{image_id}\" was deleted")]
fn image_deleted(roller_context: &RollerContext, image_id: String) -> Result<(), StepError> {
    let call = ProviderCall::Delete(image_id.trim().to_owned());
    if roller_context.provider.calls().contains(&call) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{image_id} was not deleted")))
    }
}

#[then("image \"{image_id}\" was not deleted")]
fn image_not_deleted(roller_context: &RollerContext, image_id: String) -> Result<(), StepError> {
    let call = ProviderCall::Delete(image_id.trim().to_owned());
    if roller_context.provider.calls().contains(&call) {
        Err(StepError::Assertion(format!("{image_id} should have been kept")))
    } else {
        Ok(())
    }
}

#[then("no more than {workers:u32} lifecycles ran at once")]
fn bounded_concurrency(roller_context: &RollerContext, workers: u32) -> Result<(), StepError> {
    let peak = roller_context.observer.max_in_flight();
    if usize::try_from(workers).is_ok_and(|limit| peak <= limit) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "{peak} lifecycles overlapped with {workers} workers"
        )))
    }
}

#[then("the run aborts with an authentication error")]
fn run_aborted(roller_context: &RollerContext) -> Result<(), StepError> {
    match roller_context.result.as_ref() {
        Some(RunResult::Aborted(message)) if message.contains("authentication failed") => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected an authentication abort, got {other:?}"
        ))),
    }
}

#[then("no server was processed")]
fn nothing_processed(roller_context: &RollerContext) -> Result<(), StepError> {
    let calls = roller_context.provider.calls();
    if calls == [ProviderCall::Authenticate] && roller_context.observer.outcomes().is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected only the identity exchange, saw {calls:?}"
        )))
    }
}
