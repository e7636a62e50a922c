#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! Web server for hellogae's single introspection endpoint.

mod errors;
mod introspect;
pub mod logging;
mod middleware;
pub mod probes;

pub use crate::errors::{HandlerError, HandlerErrorKind};
pub use crate::introspect::build_report;

use crate::{logging::HelloGaeRootSpanBuilder, middleware::AppEngineEntry};
use actix_web::{
    dev::Server,
    middleware::Condition,
    web::{Data, ServiceConfig},
    App, HttpServer,
};
use hellogae_platform::Platform;
use hellogae_settings::{EntryPoint, Settings};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

/// Where the process runs, decided once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Outside the platform, with a synthetic environment.
    Local,
    /// Inside the platform.
    Managed,
}

impl DeploymentMode {
    /// Whether platform calls that only work on the platform must be skipped.
    pub fn is_local(self) -> bool {
        self == Self::Local
    }
}

/// Run the web server
///
/// The returned server is a `Future` that must either be `.await`ed, or run it
/// as a background task using `tokio::spawn`.
///
/// `deployment` must be decided, and the environment seeded, before calling
/// this. Every request sees the same value. The host and port in `settings`
/// are ignored; they belong in the construction of `listener`.
///
/// # Errors
///
/// Returns an error if the server cannot be started on the provided listener.
///
/// # Examples
///
/// ```no_run
/// # actix_rt::System::new().block_on(async {
/// use hellogae_platform::Platform;
/// use hellogae_web::DeploymentMode;
///
/// let listener = std::net::TcpListener::bind("127.0.0.1:8080")
///     .expect("Failed to bind port");
/// let settings = hellogae_settings::Settings::load()
///     .expect("Failed to load settings");
/// let platform = Platform::from_process_env().expect("Failed to build platform");
/// hellogae_web::run(listener, settings, platform, DeploymentMode::Managed)
///     .expect("Failed to start server")
///     .await
///     .expect("Fatal error while running server");
/// # })
/// ```
pub fn run(
    listener: TcpListener,
    settings: Settings,
    platform: Platform,
    deployment: DeploymentMode,
) -> Result<Server, std::io::Error> {
    let num_workers = settings.http.workers;
    let managed_entry = settings.entry_point == EntryPoint::Managed;
    tracing::debug!(
        r#type = "web.configuring",
        ?deployment,
        entry_point = ?settings.entry_point,
        "Configuring web server"
    );

    let platform = Data::new(platform);
    let deployment = Data::new(deployment);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(platform.clone())
            .app_data(deployment.clone())
            .wrap(Condition::new(managed_entry, AppEngineEntry))
            .wrap(TracingLogger::<HelloGaeRootSpanBuilder>::new())
            .configure(configure)
    })
    // A client that closes its side is gone. Dropping the connection drops
    // the report in progress along with any platform call it is waiting on.
    .h1_allow_half_closed(false)
    .listen(listener)?;

    if let Some(n) = num_workers {
        server = server.workers(n);
    }

    let server = server.run();
    Ok(server)
}

/// Register every route. Does not include middleware or app data.
pub fn configure(config: &mut ServiceConfig) {
    introspect::configure(config);
}
