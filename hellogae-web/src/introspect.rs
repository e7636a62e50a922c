//! The `/` handler: run the probe catalogue and mirror the results.

use crate::{
    errors::HandlerError,
    probes::{Probe, CATALOGUE},
    DeploymentMode,
};
use actix_web::{
    web::{self, Data, ServiceConfig},
    HttpRequest, HttpResponse,
};
use hellogae_platform::{Context, Platform, PlatformError};

/// Route every method on `/` to the report.
pub fn configure(config: &mut ServiceConfig) {
    config.route("/", web::route().to(introspect));
}

/// Answer with the introspection report for this request.
#[tracing::instrument(skip_all)]
async fn introspect(
    request: HttpRequest,
    platform: Data<Platform>,
    deployment: Data<DeploymentMode>,
) -> Result<HttpResponse, HandlerError> {
    let ctx = platform.new_context(&request);
    let report = build_report(&ctx, **deployment).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(report))
}

/// Whether a probe runs in `deployment`.
fn should_run(probe: &Probe, deployment: DeploymentMode) -> bool {
    probe.local_safe || !deployment.is_local()
}

/// Run every probe in catalogue order, one at a time, and render the report.
///
/// In local mode, probes that aren't local-safe are skipped without a line.
///
/// # Errors
/// If a probe without an error channel fails. Probes with one put their error
/// in the report instead.
pub async fn build_report(
    ctx: &Context<'_>,
    deployment: DeploymentMode,
) -> Result<String, PlatformError> {
    let mut report = String::new();
    let mut emitted = 0_usize;
    let mut skipped = 0_usize;

    for group in CATALOGUE {
        report.push('\n');
        report.push_str(group.heading);
        report.push('\n');

        for probe in group.probes {
            if !should_run(probe, deployment) {
                tracing::debug!(
                    r#type = "web.introspect.skipped",
                    label = probe.label,
                    "Skipping probe that is unsafe outside the platform"
                );
                skipped += 1;
                continue;
            }
            let outcome = probe.call.invoke(ctx).await.map_err(|error| {
                tracing::error!(
                    r#type = "web.introspect.probe-error",
                    label = probe.label,
                    %error,
                    "Probe failed without an error channel"
                );
                error
            })?;
            tracing::debug!(r#type = "web.introspect.emitted", label = probe.label, "Ran probe");
            report.push_str(&probe.render(&outcome));
            emitted += 1;
        }
    }

    tracing::info!(
        r#type = "web.introspect.report",
        emitted,
        skipped,
        local = deployment.is_local(),
        "Built introspection report"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{build_report, configure};
    use crate::{probes::labels, DeploymentMode};
    use actix_web::{
        http::StatusCode,
        test::{call_service, init_service, read_body, TestRequest},
        web::Data,
        App,
    };
    use hellogae_platform::{proto, Platform, RuntimeEnv};
    use httpmock::{Method::POST, MockServer};
    use pretty_assertions::assert_eq;
    use prost::Message;

    /// The environment the bootstrapper leaves behind outside the platform.
    fn local_env() -> RuntimeEnv {
        RuntimeEnv {
            application: Some("hellogae".to_string()),
            gae_env: Some("standard".to_string()),
            runtime: Some("custom".to_string()),
            version: Some("my-version".to_string()),
            // Nothing listens here, so any attempted platform call fails.
            metadata_host: Some("127.0.0.1:1".to_string()),
            api_host: Some("127.0.0.1".to_string()),
            api_port: Some("1".to_string()),
            ..RuntimeEnv::default()
        }
    }

    fn managed_env(server: &MockServer) -> RuntimeEnv {
        RuntimeEnv {
            application: Some("s~hellogov2".to_string()),
            google_cloud_project: Some("hellogov2".to_string()),
            gae_env: Some("standard".to_string()),
            runtime: Some("custom".to_string()),
            version: Some("20241231t122815".to_string()),
            api_host: Some(server.host()),
            api_port: Some(server.port().to_string()),
            metadata_host: Some(server.address().to_string()),
            ..RuntimeEnv::default()
        }
    }

    async fn mock_metadata(server: &MockServer, key: &str, value: &str) {
        let path = format!("/computeMetadata/v1/{}", key);
        let value = value.to_string();
        server
            .mock_async(move |when, then| {
                when.path(path).header("Metadata-Flavor", "Google");
                then.status(200).body(value);
            })
            .await;
    }

    async fn mock_bridge<M: Message>(server: &MockServer, method: &str, inner: M) {
        let answer = proto::Response {
            response: Some(inner.encode_to_vec()),
            ..proto::Response::default()
        }
        .encode_to_vec();
        let method = method.to_string();
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/rpc_http").body_contains(method);
                then.status(200).body(answer);
            })
            .await;
    }

    async fn mock_platform(server: &MockServer) {
        mock_metadata(server, "instance/zone", "projects/123456/zones/us-west1-8").await;
        mock_metadata(server, "instance/attributes/gae_backend_instance", "0066d924").await;
        mock_metadata(server, "instance/attributes/gae_backend_name", "default").await;
        mock_metadata(
            server,
            "instance/attributes/gae_backend_version",
            "20241231t122815.465917320654064374",
        )
        .await;
        mock_bridge(
            server,
            "CreateLoginURL",
            proto::CreateLoginUrlResponse {
                login_url: "https://hellogov2.appspot.com/_ah/conflogin".to_string(),
            },
        )
        .await;
        mock_bridge(
            server,
            "CreateLogoutURL",
            proto::CreateLogoutUrlResponse {
                logout_url: "https://hellogov2.appspot.com/_ah/logout".to_string(),
            },
        )
        .await;
        mock_bridge(
            server,
            "GetServiceAccountName",
            proto::GetServiceAccountNameResponse {
                service_account_name: Some("hellogov2@appspot.gserviceaccount.com".to_string()),
            },
        )
        .await;
    }

    /// Labels in the order they appear in `report`.
    fn labels_in(report: &str) -> Vec<&str> {
        report
            .lines()
            .filter_map(|line| line.split_once('=').map(|(label, _)| label))
            .collect()
    }

    #[actix_rt::test]
    async fn test_local_report_skips_unsafe_probes() {
        let platform = Platform::new(local_env()).expect("platform");
        let report = build_report(&platform.background_context(), DeploymentMode::Local)
            .await
            .expect("local report never calls the platform");

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
        assert_eq!(
            report,
            "\nUser APIs:\n\
             user.Current(ctx)=<nil>\n\
             user.IsAdmin(ctx)=false\n\
             \nApp Engine APIs:\n\
             appengine.AppID(ctx)=hellogae\n\
             appengine.IsAppEngine()=true\n\
             appengine.IsDevAppServer()=false\n\
             appengine.IsFlex()=false\n\
             appengine.IsSecondGen()=true\n\
             appengine.IsStandard()=true\n\
             appengine.RequestID(ctx)=\n\
             appengine.ServerSoftware()=standard\n"
        );
    }

    #[actix_rt::test]
    async fn test_managed_report_runs_every_probe() {
        let server = MockServer::start_async().await;
        mock_platform(&server).await;
        let platform = Platform::new(managed_env(&server)).expect("platform");

        let report = build_report(&platform.background_context(), DeploymentMode::Managed)
            .await
            .expect("report");

        assert_eq!(labels_in(&report), labels().collect::<Vec<_>>());
        assert!(report.contains("appengine.Datacenter(ctx)=us-west1-8\n"));
        assert!(report.contains("appengine.InstanceID()=0066d924\n"));
        assert!(report.contains("appengine.ModuleName(ctx)=default\n"));
        assert!(report.contains(
            "user.LogoutURL(ctx, \"/\")=https://hellogov2.appspot.com/_ah/logout err=<nil>\n"
        ));
        assert!(report.contains(
            "appengine.ServiceAccount(ctx)=hellogov2@appspot.gserviceaccount.com err=<nil>\n"
        ));
        assert!(report.contains("appengine.VersionID(ctx)=20241231t122815.465917320654064374\n"));
    }

    #[actix_rt::test]
    async fn test_bridge_errors_go_in_the_report() {
        let server = MockServer::start_async().await;
        mock_metadata(&server, "instance/zone", "projects/123456/zones/us-west1-8").await;
        mock_metadata(&server, "instance/attributes/gae_backend_instance", "0066d924").await;
        mock_metadata(&server, "instance/attributes/gae_backend_name", "default").await;
        mock_metadata(&server, "instance/attributes/gae_backend_version", "1.2").await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc_http");
                then.status(503).body("unavailable");
            })
            .await;
        let platform = Platform::new(managed_env(&server)).expect("platform");

        let report = build_report(&platform.background_context(), DeploymentMode::Managed)
            .await
            .expect("bridge failures don't abort the report");

        let service_account = report
            .lines()
            .find(|line| line.starts_with("appengine.ServiceAccount(ctx)="))
            .expect("service account line");
        assert!(service_account.starts_with("appengine.ServiceAccount(ctx)= err="));
        assert!(service_account.contains("503"));
        assert!(!service_account.ends_with("err=<nil>"));
    }

    #[actix_rt::test]
    async fn test_metadata_failure_is_a_server_error() {
        let platform = Platform::new(local_env()).expect("platform");
        let app = init_service(
            App::new()
                .app_data(Data::new(platform))
                .app_data(Data::new(DeploymentMode::Managed))
                .configure(configure),
        )
        .await;

        let response = call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_rt::test]
    async fn test_any_method_gets_the_report() {
        let platform = Platform::new(local_env()).expect("platform");
        let app = init_service(
            App::new()
                .app_data(Data::new(platform))
                .app_data(Data::new(DeploymentMode::Local))
                .configure(configure),
        )
        .await;

        for request in [TestRequest::get(), TestRequest::post(), TestRequest::delete()] {
            let response = call_service(&app, request.uri("/").to_request()).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = read_body(response).await;
            let body = std::str::from_utf8(&body).expect("utf-8 body");
            assert!(body.starts_with("\nUser APIs:\n"));
            assert!(body.contains("\nApp Engine APIs:\n"));
        }
    }
}
