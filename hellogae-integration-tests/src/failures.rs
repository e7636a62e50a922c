//! Tests how the server behaves when the platform misbehaves or clients go
//! away.
#![cfg(test)]

use crate::{hellogae_test_macro, serve_platform, TestingTools};
use anyhow::Result;
use hellogae_web::DeploymentMode;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

#[hellogae_test_macro(|config| config.serve_platform = false)]
async fn unreachable_metadata_fails_the_request(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let response = test_client.get("/").send().await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_str(&response.text().await?)?;
    let error = body["error"].as_str().expect("error message");
    assert!(error.starts_with("Platform call failed: "));
    assert!(error.contains("gae_backend_instance"));

    // The failure is per request, the server keeps answering.
    let response = test_client.get("/").send().await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    Ok(())
}

#[hellogae_test_macro(|config| {
    config.deployment = DeploymentMode::Local;
    config.serve_platform = false;
})]
async fn local_mode_does_not_need_the_platform(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let response = test_client.get("/").send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[hellogae_test_macro(|config| config.bridge_delay = Some(Duration::from_millis(200)))]
async fn disconnected_clients_leave_the_server_healthy(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    // Give up while the first service call is still waiting on the bridge.
    let abandoned = test_client
        .get("/?case=abandoned")
        .timeout(Duration::from_millis(50))
        .send()
        .await;
    assert!(abandoned.is_err());

    let response = test_client.get("/?case=after-abandoned").send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let report = response.text().await?;
    assert!(report.contains("\nApp Engine APIs:\n"));
    assert!(report.contains("appengine.VersionID(ctx)="));

    Ok(())
}

#[hellogae_test_macro(|config| config.serve_platform = false)]
async fn abandoned_requests_stop_calling_the_platform(
    TestingTools {
        test_client,
        platform_mock,
        ..
    }: TestingTools,
) -> Result<()> {
    let bridge = serve_platform(&platform_mock, Some(Duration::from_millis(400))).await;

    // The client leaves while the login URL call is waiting on the bridge.
    let abandoned = test_client
        .get("/?case=stop-calling")
        .timeout(Duration::from_millis(50))
        .send()
        .await;
    assert!(abandoned.is_err());

    // Long enough for the logout URL and service account calls to have
    // reached the bridge if the report had kept going.
    actix_rt::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(bridge.login_url.hits_async().await, 1);
    assert_eq!(bridge.logout_url.hits_async().await, 0);
    assert_eq!(bridge.service_account.hits_async().await, 0);

    Ok(())
}
