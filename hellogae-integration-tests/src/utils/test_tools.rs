//! Tools for running tests

use crate::utils::logging::LogWatcher;
use hellogae_platform::{proto, Platform, RuntimeEnv};
use hellogae_settings::Settings;
use hellogae_web::DeploymentMode;
use httpmock::{Method::POST, Mock, MockServer};
use prost::Message;
use reqwest::{redirect, Client, ClientBuilder, Method, RequestBuilder};
use std::{future::Future, net::TcpListener, time::Duration};

/// Zone reported by the mock metadata server.
pub const MOCK_ZONE: &str = "projects/123456/zones/us-west1-8";
/// Instance id reported by the mock metadata server.
pub const MOCK_INSTANCE: &str = "0066d924";
/// Service name reported by the mock metadata server.
pub const MOCK_MODULE: &str = "default";
/// Version id reported by the mock metadata server.
pub const MOCK_VERSION: &str = "20241231t122815.465917320654064374";
/// Login URL returned by the mock service bridge.
pub const MOCK_LOGIN_URL: &str = "https://hellogov2.appspot.com/_ah/conflogin?continue=/";
/// Logout URL returned by the mock service bridge.
pub const MOCK_LOGOUT_URL: &str = "https://hellogov2.appspot.com/_ah/logout?continue=/";
/// Service account returned by the mock service bridge.
pub const MOCK_SERVICE_ACCOUNT: &str = "hellogov2@appspot.gserviceaccount.com";

/// Everything a test can change before the server starts.
pub struct TestConfig {
    /// Settings handed to the server.
    pub settings: Settings,

    /// The deployment mode the bootstrapper would have decided.
    pub deployment: DeploymentMode,

    /// Whether the platform mock answers metadata and service bridge calls.
    /// Only applies to managed mode; in local mode the mock never answers, so
    /// any attempted platform call would fail.
    pub serve_platform: bool,

    /// How long the mock service bridge waits before answering.
    pub bridge_delay: Option<Duration>,
}

/// Run a test with a fully configured hellogae server.
///
/// The server will listen on a port assigned arbitrarily by the OS.
///
/// A suite of tools will be passed to the test function in the form of an
/// instance of [`TestingTools`]. It includes an HTTP client configured to use
/// the test server, an HTTP mock server playing the platform's metadata
/// server and service bridge, and a log collector that can make assertions
/// about logs that were printed.
///
/// The defaults are a managed deployment with the bare entry point.
///
/// # Example
///
/// ```
/// # use hellogae_integration_tests::{hellogae_test, TestingTools};
/// # use hellogae_web::DeploymentMode;
/// # actix_rt::System::new().block_on(async {
/// hellogae_test(
///     |config| config.deployment = DeploymentMode::Local,
///     |TestingTools { test_client, .. }| async move {
///         assert!(true) // Test goes here
///     }
/// ).await
/// # })
/// ```
///
/// # Panics
/// May panic if tests could not be set up correctly.
pub async fn hellogae_test<FConfig, FTest, Fut>(config_changer: FConfig, test: FTest) -> Fut::Output
where
    FConfig: FnOnce(&mut TestConfig),
    FTest: FnOnce(TestingTools) -> Fut,
    Fut: Future,
{
    let log_watcher = LogWatcher::global();

    let mut config = TestConfig {
        settings: Settings::load_for_tests(|_| ()),
        deployment: DeploymentMode::Managed,
        serve_platform: true,
        bridge_delay: None,
    };
    config_changer(&mut config);

    let platform_mock = MockServer::start_async().await;
    let runtime_env = match config.deployment {
        DeploymentMode::Local => local_env(&platform_mock),
        DeploymentMode::Managed => {
            if config.serve_platform {
                serve_platform(&platform_mock, config.bridge_delay).await;
            }
            managed_env(&platform_mock)
        }
    };
    let platform = Platform::new(runtime_env).expect("Failed to build platform");

    // Run server in the background
    let listener = TcpListener::bind((config.settings.http.host, 0)).expect("Failed to bind to a port");
    let address = listener
        .local_addr()
        .expect("Listener has no address")
        .to_string();
    let server = hellogae_web::run(listener, config.settings, platform, config.deployment)
        .expect("Failed to start server");
    let server_handle = server.handle();
    actix_rt::spawn(server);
    let test_client = TestReqwestClient::new(address);

    // Assemble the tools
    let tools = TestingTools {
        test_client,
        platform_mock,
        log_watcher,
    };
    // Run the test
    let rv = test(tools).await;
    server_handle.stop(false).await;
    rv
}

/// The environment the bootstrapper seeds outside the platform. Platform
/// services point at `server`, which has nothing mocked.
fn local_env(server: &MockServer) -> RuntimeEnv {
    RuntimeEnv {
        application: Some("hellogae".to_string()),
        runtime: Some("custom".to_string()),
        version: Some("my-version".to_string()),
        gae_env: Some("standard".to_string()),
        ..platform_services(server)
    }
}

/// The environment of a deployed second generation instance.
fn managed_env(server: &MockServer) -> RuntimeEnv {
    RuntimeEnv {
        application: Some("s~hellogov2".to_string()),
        google_cloud_project: Some("hellogov2".to_string()),
        runtime: Some("custom".to_string()),
        version: Some("20241231t122815".to_string()),
        gae_env: Some("standard".to_string()),
        ..platform_services(server)
    }
}

/// Point the metadata server and the service bridge at `server`.
fn platform_services(server: &MockServer) -> RuntimeEnv {
    RuntimeEnv {
        api_host: Some(server.host()),
        api_port: Some(server.port().to_string()),
        metadata_host: Some(server.address().to_string()),
        ..RuntimeEnv::default()
    }
}

/// The service bridge mocks registered by [`serve_platform`], one per call the
/// report makes.
pub struct BridgeMocks<'a> {
    /// Answers `user.CreateLoginURL`.
    pub login_url: Mock<'a>,
    /// Answers `user.CreateLogoutURL`.
    pub logout_url: Mock<'a>,
    /// Answers `app_identity_service.GetServiceAccountName`.
    pub service_account: Mock<'a>,
}

/// Answer every metadata key and service call the report makes.
///
/// Tests that need to count service calls set `serve_platform` to false and
/// call this themselves to keep the mocks.
pub async fn serve_platform(server: &MockServer, bridge_delay: Option<Duration>) -> BridgeMocks<'_> {
    for (key, value) in [
        ("instance/zone", MOCK_ZONE),
        ("instance/attributes/gae_backend_instance", MOCK_INSTANCE),
        ("instance/attributes/gae_backend_name", MOCK_MODULE),
        ("instance/attributes/gae_backend_version", MOCK_VERSION),
    ] {
        let path = format!("/computeMetadata/v1/{}", key);
        server
            .mock_async(|when, then| {
                when.path(path).header("Metadata-Flavor", "Google");
                then.status(200).body(value);
            })
            .await;
    }

    let delay = bridge_delay.unwrap_or_default();
    let mut mocks = Vec::with_capacity(3);
    for (method, answer) in [
        (
            "CreateLoginURL",
            proto::CreateLoginUrlResponse {
                login_url: MOCK_LOGIN_URL.to_string(),
            }
            .encode_to_vec(),
        ),
        (
            "CreateLogoutURL",
            proto::CreateLogoutUrlResponse {
                logout_url: MOCK_LOGOUT_URL.to_string(),
            }
            .encode_to_vec(),
        ),
        (
            "GetServiceAccountName",
            proto::GetServiceAccountNameResponse {
                service_account_name: Some(MOCK_SERVICE_ACCOUNT.to_string()),
            }
            .encode_to_vec(),
        ),
    ] {
        let envelope = proto::Response {
            response: Some(answer),
            ..proto::Response::default()
        };
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc_http").body_contains(method);
                then.status(200)
                    .delay(delay)
                    .body(envelope.encode_to_vec());
            })
            .await;
        mocks.push(mock);
    }

    let mut mocks = mocks.into_iter();
    let mut next = || mocks.next().expect("one mock per service call");
    BridgeMocks {
        login_url: next(),
        logout_url: next(),
        service_account: next(),
    }
}

/// A set of tools for tests, including mock servers and logging helpers.
///
/// The fields of this struct are marked as non-exhaustive, meaning that any
/// destructuring of this struct will require a `..` "and the rest" entry, even
/// if all present items are named. This makes adding tools in the future easier,
/// since old tests won't need to be rewritten to account for the added tools.
#[non_exhaustive]
pub struct TestingTools {
    /// A wrapper around a `reqwest::client` that automatically uses the
    /// hellogae server under test.
    pub test_client: TestReqwestClient,

    /// A [`httpmock::MockServer`] the platform SDK uses as both its metadata
    /// server and its service bridge.
    pub platform_mock: MockServer,

    /// To make assertions about logs.
    pub log_watcher: LogWatcher,
}

/// A wrapper around a `[reqwest::client]` that automatically sends requests to
/// the test server.
///
/// The client is configured to not follow any redirects.
pub struct TestReqwestClient {
    /// The wrapped client.
    client: Client,

    /// The server address to implicitly use for all requests.
    address: String,
}

impl TestReqwestClient {
    /// Construct a new test client that uses `address` for every request given.
    pub fn new(address: String) -> Self {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::none())
            .build()
            .expect("Could not build test client");
        Self { client, address }
    }

    /// Start building a GET request to the test server with the path specified.
    ///
    /// The path should start with `/`, such as `/?case=local`.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Start building a request with any method to the test server.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        assert!(path.starts_with('/'));
        let url = format!("http://{}{}", &self.address, path);
        self.client.request(method, url)
    }
}
