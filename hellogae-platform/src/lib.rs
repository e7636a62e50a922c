#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! A small SDK for the hosting platform that `hellogae` observes.
//!
//! It answers the same questions the platform's official SDKs answer, using
//! the same sources the platform documents for its second generation
//! runtimes:
//!
//! - the process environment ([`RuntimeEnv`]),
//! - the instance metadata server ([`metadata::MetadataClient`]),
//! - the service bridge for bundled services ([`bridge::ServiceBridge`]),
//! - headers the platform adds to each inbound request ([`RequestInfo`]).
//!
//! [`appengine`] and [`user`] hold the queries. Queries that depend on the
//! inbound request take a [`Context`], created with [`Platform::new_context`].

pub mod appengine;
pub mod bridge;
pub mod env;
mod errors;
pub mod metadata;
pub mod proto;
pub mod request;
pub mod user;

pub use crate::{
    env::RuntimeEnv,
    errors::{rpc_code, ApiError, CallError, PlatformError},
    request::RequestInfo,
};

use crate::{bridge::ServiceBridge, metadata::MetadataClient};
use actix_web::{HttpMessage, HttpRequest};
use tokio::sync::OnceCell;

/// Process wide SDK state, shared by every request.
#[derive(Debug)]
pub struct Platform {
    /// Environment as it was when the platform was created.
    env: RuntimeEnv,
    /// Metadata server client.
    metadata: MetadataClient,
    /// Service bridge client.
    bridge: ServiceBridge,
    /// The ticket for calls made without a request ticket, computed once.
    default_ticket: OnceCell<String>,
}

impl Platform {
    /// Create the SDK from a snapshot of the environment.
    ///
    /// Take the snapshot after any startup code that changes the environment
    /// has run.
    ///
    /// # Errors
    /// If the HTTP client can't be built.
    pub fn new(env: RuntimeEnv) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(PlatformError::Client)?;
        let metadata = MetadataClient::new(client.clone(), env.metadata_host.as_deref());
        let bridge = ServiceBridge::new(client, env.api_host.as_deref(), env.api_port.as_deref());
        Ok(Self {
            env,
            metadata,
            bridge,
            default_ticket: OnceCell::new(),
        })
    }

    /// Create the SDK from the current process environment.
    ///
    /// # Errors
    /// If the HTTP client can't be built.
    pub fn from_process_env() -> Result<Self, PlatformError> {
        Self::new(RuntimeEnv::from_process())
    }

    /// The environment snapshot.
    pub fn env(&self) -> &RuntimeEnv {
        &self.env
    }

    /// The metadata server client.
    pub fn metadata(&self) -> &MetadataClient {
        &self.metadata
    }

    /// Create the context for an inbound request.
    ///
    /// The context only knows about the request if the managed entry point
    /// attached a [`RequestInfo`] to it.
    pub fn new_context(&self, req: &HttpRequest) -> Context<'_> {
        let request = req.extensions().get::<RequestInfo>().cloned();
        Context {
            platform: self,
            request,
        }
    }

    /// Create a context that isn't tied to any request.
    pub fn background_context(&self) -> Context<'_> {
        Context {
            platform: self,
            request: None,
        }
    }

    /// The ticket used when a request doesn't bring its own.
    ///
    /// `DEFAULT_TICKET` wins if set. Otherwise the ticket is derived from the
    /// application id and the instance's service, version, and id.
    async fn default_ticket(&self) -> Result<&str, PlatformError> {
        let ticket = self
            .default_ticket
            .get_or_try_init(|| async {
                if let Some(ticket) = &self.env.default_ticket {
                    return Ok(ticket.clone());
                }
                if appengine::is_dev_app_server(self) {
                    return Ok("testapp/default.1.1".to_string());
                }
                let app_id = appengine::app_id_from(&self.env).replace([':', '.'], "_");
                let module = appengine::module_name_of(self).await?;
                let version = appengine::version_id_of(self).await?;
                let major = version.split('.').next().unwrap_or_default();
                let instance = appengine::instance_id(self).await?;
                Ok::<_, PlatformError>(format!("{}/{}.{}.{}", app_id, module, major, instance))
            })
            .await?;
        Ok(ticket)
    }
}

/// Everything the SDK knows about one inbound request.
///
/// Bound to a single request and dropped with it.
#[derive(Debug)]
pub struct Context<'p> {
    /// The shared SDK state.
    platform: &'p Platform,
    /// Headers captured by the managed entry point, if any.
    request: Option<RequestInfo>,
}

impl<'p> Context<'p> {
    /// The shared SDK state.
    pub fn platform(&self) -> &'p Platform {
        self.platform
    }

    /// The value of a platform request header, `""` if absent or if the
    /// request wasn't captured.
    pub fn header(&self, name: &str) -> &str {
        self.request
            .as_ref()
            .map(|info| info.header(name))
            .unwrap_or_default()
    }

    /// Whether the managed entry point captured this request.
    pub fn has_request(&self) -> bool {
        self.request.is_some()
    }

    /// Call a bundled service on behalf of this request.
    pub(crate) async fn call<Req, Res>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Res, PlatformError>
    where
        Req: prost::Message,
        Res: prost::Message + Default,
    {
        let ticket = match self.header(crate::request::API_TICKET) {
            "" => self.platform.default_ticket().await?.to_string(),
            ticket => ticket.to_string(),
        };
        self.platform
            .bridge
            .call(&ticket, service, method, request)
            .await
    }
}


#[cfg(test)]
mod tests {
    use crate::{
        request::{API_TICKET, REQUEST_LOG_ID},
        test_support::{deployed_platform, mock_metadata},
        RequestInfo,
    };
    use actix_web::{test::TestRequest, HttpMessage};
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_context_without_captured_request() {
        let server = MockServer::start();
        let platform = deployed_platform(&server);
        let req = TestRequest::default()
            .insert_header((REQUEST_LOG_ID, "abc"))
            .to_http_request();

        let ctx = platform.new_context(&req);
        assert!(!ctx.has_request());
        assert_eq!(ctx.header(REQUEST_LOG_ID), "");
    }

    #[test]
    fn test_context_with_captured_request() {
        let server = MockServer::start();
        let platform = deployed_platform(&server);
        let req = TestRequest::default()
            .insert_header((REQUEST_LOG_ID, "abc"))
            .to_http_request();
        req.extensions_mut()
            .insert(RequestInfo::from_headers(req.headers()));

        let ctx = platform.new_context(&req);
        assert!(ctx.has_request());
        assert_eq!(ctx.header(REQUEST_LOG_ID), "abc");
        assert_eq!(ctx.header(API_TICKET), "");
    }

    #[tokio::test]
    async fn test_default_ticket_from_metadata() {
        let server = MockServer::start_async().await;
        mock_metadata(&server, "instance/attributes/gae_backend_name", "default").await;
        mock_metadata(
            &server,
            "instance/attributes/gae_backend_version",
            "20241231t122815.465917320654064374",
        )
        .await;
        mock_metadata(&server, "instance/attributes/gae_backend_instance", "0066d9").await;
        let platform = deployed_platform(&server);

        let ticket = platform.default_ticket().await.expect("ticket");
        assert_eq!(ticket, "hellogov2/default.20241231t122815.0066d9");
    }

    #[tokio::test]
    async fn test_default_ticket_from_env() {
        let server = MockServer::start_async().await;
        let mut env = crate::test_support::deployed_env(&server);
        env.default_ticket = Some("fixed-ticket".to_string());
        let platform = crate::Platform::new(env).expect("platform");

        assert_eq!(platform.default_ticket().await.expect("ticket"), "fixed-ticket");
    }
}
