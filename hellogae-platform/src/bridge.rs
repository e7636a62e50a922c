//! The service bridge, which carries calls to the platform's bundled services.

use crate::{
    errors::{ApiError, CallError, PlatformError},
    proto,
};
use prost::Message;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::time::Duration;

/// Host of the service bridge inside the platform.
pub const DEFAULT_API_HOST: &str = "appengine.googleapis.internal";

/// Port of the service bridge inside the platform.
pub const DEFAULT_API_PORT: &str = "10001";

/// How long a call may take.
const API_DEADLINE: Duration = Duration::from_secs(60);

/// Sends remote API calls to the bridge over HTTP.
#[derive(Clone, Debug)]
pub struct ServiceBridge {
    /// Shared HTTP client.
    client: Client,
    /// Full URL of the bridge endpoint.
    url: String,
}

impl ServiceBridge {
    /// Create a bridge client. Missing host and port fall back to the
    /// platform's internal defaults.
    pub fn new(client: Client, host: Option<&str>, port: Option<&str>) -> Self {
        let url = format!(
            "http://{}:{}/rpc_http",
            host.unwrap_or(DEFAULT_API_HOST),
            port.unwrap_or(DEFAULT_API_PORT)
        );
        Self { client, url }
    }

    /// Call `service.method` with `request`, authorized by `ticket`.
    ///
    /// # Errors
    /// A [`CallError`] if the bridge can't be reached or rejects the call, an
    /// [`ApiError`] if the service itself refuses, and a decode error if the
    /// answer is malformed.
    pub async fn call<Req, Res>(
        &self,
        ticket: &str,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Res, PlatformError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let envelope = proto::Request {
            service_name: service.to_string(),
            method: method.to_string(),
            request: request.encode_to_vec(),
            request_id: Some(ticket.to_string()),
        };

        tracing::debug!(%service, %method, url = %self.url, "Calling service bridge");
        let response = self
            .client
            .post(&self.url)
            .timeout(API_DEADLINE)
            .header("X-Google-RPC-Service-Endpoint", "app-engine-apis")
            .header("X-Google-RPC-Service-Method", "/VMRemoteAPI.CallRemoteAPI")
            .header(
                "X-Google-RPC-Service-Deadline",
                API_DEADLINE.as_secs().to_string(),
            )
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(envelope.encode_to_vec())
            .send()
            .await
            .map_err(|error| CallError::unknown(format!("service bridge HTTP failed: {}", error)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| CallError::unknown(format!("service bridge HTTP failed: {}", error)))?;
        if status != StatusCode::OK {
            return Err(CallError::unknown(format!(
                "service bridge returned HTTP {} ({:?})",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            ))
            .into());
        }

        let answer = proto::Response::decode(body).map_err(|source| PlatformError::Decode {
            what: "service bridge response",
            source,
        })?;

        if let Some(rpc_error) = answer.rpc_error {
            return Err(CallError::from_rpc(rpc_error.code, rpc_error.detail.unwrap_or_default()).into());
        }
        if let Some(app_error) = answer.application_error {
            return Err(ApiError {
                service: service.to_string(),
                code: app_error.code,
                detail: app_error.detail,
            }
            .into());
        }
        if answer.exception.is_some() || answer.java_exception.is_some() {
            return Err(CallError::unknown("service bridge returned exception").into());
        }

        Res::decode(answer.response.unwrap_or_default().as_slice()).map_err(|source| {
            PlatformError::Decode {
                what: "service response",
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceBridge;
    use crate::{errors::PlatformError, proto};
    use httpmock::{Method::POST, MockServer};
    use pretty_assertions::assert_eq;
    use prost::Message;

    fn bridge_for(server: &MockServer) -> ServiceBridge {
        ServiceBridge::new(
            reqwest::Client::new(),
            Some(&server.host()),
            Some(&server.port().to_string()),
        )
    }

    #[tokio::test]
    async fn test_successful_call() {
        let server = MockServer::start_async().await;
        let inner = proto::GetServiceAccountNameResponse {
            service_account_name: Some("hellogov2@appspot.gserviceaccount.com".to_string()),
        };
        let answer = proto::Response {
            response: Some(inner.encode_to_vec()),
            ..proto::Response::default()
        };
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rpc_http")
                    .header("X-Google-RPC-Service-Endpoint", "app-engine-apis")
                    .header("X-Google-RPC-Service-Method", "/VMRemoteAPI.CallRemoteAPI")
                    .header("Content-Type", "application/octet-stream");
                then.status(200).body(answer.encode_to_vec());
            })
            .await;

        let response: proto::GetServiceAccountNameResponse = bridge_for(&server)
            .call(
                "ticket",
                "app_identity_service",
                "GetServiceAccountName",
                &proto::GetServiceAccountNameRequest {},
            )
            .await
            .expect("call should succeed");

        assert_eq!(
            response.service_account_name.as_deref(),
            Some("hellogov2@appspot.gserviceaccount.com")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_application_error() {
        let server = MockServer::start_async().await;
        let answer = proto::Response {
            application_error: Some(proto::ApplicationError {
                code: 2,
                detail: String::new(),
            }),
            ..proto::Response::default()
        };
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc_http");
                then.status(200).body(answer.encode_to_vec());
            })
            .await;

        let error = bridge_for(&server)
            .call::<_, proto::CreateLoginUrlResponse>(
                "ticket",
                "user",
                "CreateLoginURL",
                &proto::CreateLoginUrlRequest {
                    destination_url: "/".to_string(),
                    ..proto::CreateLoginUrlRequest::default()
                },
            )
            .await
            .expect_err("call should fail");

        assert!(matches!(error, PlatformError::Api(_)));
        assert_eq!(error.to_string(), "API error 2 (user: NOT_ALLOWED)");
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc_http");
                then.status(503).body("unavailable");
            })
            .await;

        let error = bridge_for(&server)
            .call::<_, proto::GetServiceAccountNameResponse>(
                "ticket",
                "app_identity_service",
                "GetServiceAccountName",
                &proto::GetServiceAccountNameRequest {},
            )
            .await
            .expect_err("call should fail");

        assert_eq!(
            error.to_string(),
            "service bridge returned HTTP 503 (\"unavailable\")"
        );
    }

    #[tokio::test]
    async fn test_unreachable_bridge() {
        let bridge = ServiceBridge::new(reqwest::Client::new(), Some("127.0.0.1"), Some("1"));
        let error = bridge
            .call::<_, proto::GetServiceAccountNameResponse>(
                "ticket",
                "app_identity_service",
                "GetServiceAccountName",
                &proto::GetServiceAccountNameRequest {},
            )
            .await
            .expect_err("call should fail");

        assert!(error.to_string().starts_with("service bridge HTTP failed: "));
    }
}
