//! Tests the introspection report in both deployment modes.
#![cfg(test)]

use crate::{
    hellogae_test_macro,
    utils::test_tools::{
        MOCK_INSTANCE, MOCK_LOGIN_URL, MOCK_LOGOUT_URL, MOCK_MODULE, MOCK_SERVICE_ACCOUNT,
        MOCK_VERSION,
    },
    TestingTools,
};
use anyhow::Result;
use hellogae_web::{probes::labels, DeploymentMode};
use parameterized::parameterized;
use reqwest::{Method, StatusCode};

/// Labels in the order they appear in `report`.
fn labels_in(report: &str) -> Vec<&str> {
    report
        .lines()
        .filter_map(|line| line.split_once('=').map(|(label, _)| label))
        .collect()
}

/// The line for `label`, if the report has one.
fn line_for<'a>(report: &'a str, label: &str) -> Option<&'a str> {
    report
        .lines()
        .find(|line| line.split_once('=').map(|(l, _)| l) == Some(label))
}

#[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
async fn local_mode_reports_only_local_safe_probes(
    TestingTools {
        test_client,
        platform_mock,
        ..
    }: TestingTools,
) -> Result<()> {
    let any_platform_call = platform_mock
        .mock_async(|_when, then| {
            then.status(500);
        })
        .await;

    let response = test_client.get("/").send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let report = response.text().await?;

    assert_eq!(
        labels_in(&report),
        vec![
            "user.Current(ctx)",
            "user.IsAdmin(ctx)",
            "appengine.AppID(ctx)",
            "appengine.IsAppEngine()",
            "appengine.IsDevAppServer()",
            "appengine.IsFlex()",
            "appengine.IsSecondGen()",
            "appengine.IsStandard()",
            "appengine.RequestID(ctx)",
            "appengine.ServerSoftware()",
        ]
    );
    assert_eq!(line_for(&report, "appengine.AppID(ctx)"), Some("appengine.AppID(ctx)=hellogae"));
    any_platform_call.assert_hits_async(0).await;

    Ok(())
}

#[hellogae_test_macro]
async fn managed_mode_reports_every_probe(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let response = test_client.get("/").send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let report = response.text().await?;

    assert_eq!(labels_in(&report), labels().collect::<Vec<_>>());

    let expected = [
        ("user.Current(ctx)", "<nil>".to_string()),
        ("user.IsAdmin(ctx)", "false".to_string()),
        (
            r#"user.LoginURL(ctx, "/")"#,
            format!("{} err=<nil>", MOCK_LOGIN_URL),
        ),
        (
            r#"user.LogoutURL(ctx, "/")"#,
            format!("{} err=<nil>", MOCK_LOGOUT_URL),
        ),
        ("appengine.AppID(ctx)", "hellogov2".to_string()),
        ("appengine.Datacenter(ctx)", "us-west1-8".to_string()),
        ("appengine.InstanceID()", MOCK_INSTANCE.to_string()),
        ("appengine.IsAppEngine()", "true".to_string()),
        ("appengine.IsFlex()", "false".to_string()),
        ("appengine.ModuleName(ctx)", MOCK_MODULE.to_string()),
        ("appengine.ServerSoftware()", "standard".to_string()),
        (
            "appengine.ServiceAccount(ctx)",
            format!("{} err=<nil>", MOCK_SERVICE_ACCOUNT),
        ),
        ("appengine.VersionID(ctx)", MOCK_VERSION.to_string()),
    ];
    for (label, value) in expected {
        assert_eq!(
            line_for(&report, label),
            Some(format!("{}={}", label, value).as_str())
        );
    }

    Ok(())
}

#[hellogae_test_macro(|config, deployment: DeploymentMode| config.deployment = deployment)]
#[parameterized(deployment = { DeploymentMode::Local, DeploymentMode::Managed })]
async fn headings_and_local_safe_probes_appear_once(TestingTools { test_client, .. }: TestingTools) {
    let report = test_client
        .get("/")
        .send()
        .await
        .expect("failed to execute request")
        .text()
        .await
        .expect("failed to read body");

    let user = report.find("\nUser APIs:\n").expect("user heading");
    let app_engine = report
        .find("\nApp Engine APIs:\n")
        .expect("app engine heading");
    assert!(user < app_engine);

    for label in [
        "user.Current(ctx)",
        "user.IsAdmin(ctx)",
        "appengine.AppID(ctx)",
        "appengine.IsAppEngine()",
        "appengine.IsDevAppServer()",
        "appengine.IsFlex()",
        "appengine.IsSecondGen()",
        "appengine.IsStandard()",
        "appengine.RequestID(ctx)",
        "appengine.ServerSoftware()",
    ] {
        assert_eq!(
            labels_in(&report).iter().filter(|&&l| l == label).count(),
            1,
            "{} should appear exactly once",
            label
        );
    }
}

#[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
#[parameterized(method = { Method::GET, Method::POST, Method::PUT, Method::DELETE })]
async fn every_method_gets_the_report(TestingTools { test_client, .. }: TestingTools, method: Method) {
    let response = test_client
        .request(method, "/")
        .send()
        .await
        .expect("failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let report = response.text().await.expect("failed to read body");
    assert!(report.starts_with("\nUser APIs:\n"));
}

#[hellogae_test_macro(|config| config.deployment = DeploymentMode::Local)]
async fn deployment_mode_is_the_same_for_every_request(
    TestingTools { test_client, .. }: TestingTools,
) -> Result<()> {
    let first = test_client.get("/").send().await?.text().await?;
    let second = test_client.get("/").send().await?.text().await?;

    assert_eq!(labels_in(&first), labels_in(&second));

    Ok(())
}
