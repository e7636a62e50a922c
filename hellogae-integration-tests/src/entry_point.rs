//! Tests the difference between the managed entry point and the bare
//! listener, as seen through the report.
#![cfg(test)]

use crate::{hellogae_test_macro, TestingTools, TestReqwestClient};
use anyhow::Result;
use hellogae_platform::request::{
    DEFAULT_VERSION_HOSTNAME, REQUEST_LOG_ID, USER_EMAIL, USER_IS_ADMIN,
};
use hellogae_settings::EntryPoint;
use pretty_assertions::assert_eq;

/// Ask for the report the way the platform's front end would forward a
/// request from a signed in administrator.
async fn report_for_signed_in_admin(test_client: &TestReqwestClient) -> Result<String> {
    let report = test_client
        .get("/")
        .header(REQUEST_LOG_ID, "5f1a2b3c00ff0a8c4b6c1d9e2d0001")
        .header(DEFAULT_VERSION_HOSTNAME, "hellogov2.appspot.com")
        .header(USER_EMAIL, "fred@example.com")
        .header(USER_IS_ADMIN, "1")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(report)
}

#[hellogae_test_macro(|config| config.settings.entry_point = EntryPoint::Managed)]
async fn managed_entry_point_sees_request_headers(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let report = report_for_signed_in_admin(&test_client).await?;
    let lines: Vec<&str> = report.lines().collect();

    assert!(lines.contains(&"user.Current(ctx)=fred@example.com"));
    assert!(lines.contains(&"user.IsAdmin(ctx)=true"));
    assert!(lines.contains(&"appengine.RequestID(ctx)=5f1a2b3c00ff0a8c4b6c1d9e2d0001"));
    assert!(lines.contains(&"appengine.DefaultVersionHostname(ctx)=hellogov2.appspot.com"));

    Ok(())
}

#[hellogae_test_macro(|config| config.settings.entry_point = EntryPoint::Bare)]
async fn bare_entry_point_ignores_request_headers(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let report = report_for_signed_in_admin(&test_client).await?;
    let lines: Vec<&str> = report.lines().collect();

    assert!(lines.contains(&"user.Current(ctx)=<nil>"));
    assert!(lines.contains(&"user.IsAdmin(ctx)=false"));
    assert!(lines.contains(&"appengine.RequestID(ctx)="));
    assert!(lines.contains(&"appengine.DefaultVersionHostname(ctx)="));

    Ok(())
}

#[hellogae_test_macro(|config| config.settings.entry_point = EntryPoint::Managed)]
async fn entry_point_only_changes_request_values(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    // Without platform headers the managed entry point reports what the bare
    // listener would.
    let report = test_client.get("/").send().await?.text().await?;
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(
        lines
            .iter()
            .filter(|line| line.starts_with("appengine.RequestID(ctx)="))
            .collect::<Vec<_>>(),
        vec![&"appengine.RequestID(ctx)="]
    );
    assert!(lines.contains(&"user.Current(ctx)=<nil>"));

    Ok(())
}
