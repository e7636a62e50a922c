//! Tests that hellogae logs behave as expected.
//!
//! Every test here requests a path with a query string unique to it, and only
//! looks at events logged while handling that request, since all tests share
//! one log.
#![cfg(test)]

use crate::{hellogae_test_macro, TestingTools};
use anyhow::Result;
use hellogae_web::DeploymentMode;
use reqwest::StatusCode;

#[hellogae_test_macro]
async fn successful_requests_are_logged(
    TestingTools {
        test_client,
        mut log_watcher,
        ..
    }: TestingTools,
) -> Result<()> {
    let target = "/?case=successful-requests-are-logged";
    let response = test_client.get(target).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(log_watcher.has(|event| event.in_request(target)
        && event.level == "INFO"
        && event.field_contains("message", "Request success")));
    assert!(log_watcher.has(|event| event.in_request(target)
        && event.field_contains("message", "Built introspection report")
        && event.fields.get("emitted") == Some(&serde_json::json!(18))
        && event.fields.get("skipped") == Some(&serde_json::json!(0))));

    Ok(())
}

#[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
async fn skipped_probes_are_logged(
    TestingTools {
        test_client,
        mut log_watcher,
        ..
    }: TestingTools,
) -> Result<()> {
    let target = "/?case=skipped-probes-are-logged";
    test_client.get(target).send().await?;

    assert!(log_watcher.has(|event| event.in_request(target)
        && event.field_contains("message", "Skipping probe")
        && event.field_contains("label", "appengine.InstanceID()")));
    assert!(log_watcher.has(|event| event.in_request(target)
        && event.field_contains("message", "Built introspection report")
        && event.fields.get("skipped") == Some(&serde_json::json!(8))));

    Ok(())
}

#[hellogae_test_macro(|config| config.serve_platform = false)]
async fn server_errors_are_logged(
    TestingTools {
        test_client,
        mut log_watcher,
        ..
    }: TestingTools,
) -> Result<()> {
    let target = "/?case=server-errors-are-logged";
    let response = test_client.get(target).send().await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(log_watcher.has(|event| event.in_request(target)
        && event.level == "ERROR"
        && event.field_contains("message", "Request server error")));
    assert!(log_watcher.has(|event| event.in_request(target)
        && event.level == "WARN"
        && event.field_contains("message", "Could not determine the datacenter")));

    Ok(())
}
