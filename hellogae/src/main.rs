#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! A diagnostic web server that reports, for every request, what the hosting
//! platform's SDK says about the application, the instance, and the request.
//!
//! hellogae is split into several subcrates that work in collaboration.
//!
//! - [hellogae-platform](../hellogae_platform/index.html)
//! - [hellogae-settings](../hellogae_settings/index.html)
//! - [hellogae-web](../hellogae_web/index.html)
//! - [hellogae-integration-tests](../hellogae_integration_tests/index.html)

mod bootstrap;

use crate::bootstrap::{Bootstrap, ProcessEnv};
use anyhow::{Context, Result};
use hellogae_platform::Platform;
use hellogae_settings::{LogFormat, Settings};
use std::net::TcpListener;
use tracing_actix_web_mozlog::{JsonStorageLayer, MozLogFormatLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Primary entry point
#[actix_rt::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Loading settings")?;
    init_logging(&settings).context("Initializing logging")?;

    // Everything that reads the platform environment must come after this.
    let bootstrap = Bootstrap::run(&mut ProcessEnv, &settings.local)?;
    let platform = Platform::from_process_env().context("Setting up the platform SDK")?;

    let listener = TcpListener::bind((settings.http.host, bootstrap.port))
        .with_context(|| format!("Binding port {}", bootstrap.port))?;
    tracing::info!(
        r#type = "app.listening",
        port = bootstrap.port,
        "Listening on port {}",
        bootstrap.port
    );

    hellogae_web::run(listener, settings, platform, bootstrap.deployment)
        .context("Starting hellogae-web server")?
        .await
        .context("Running hellogae-web server")?;

    Ok(())
}

/// Set up logging for hellogae, based on settings and the `RUST_LOG` environment variable.
fn init_logging(settings: &Settings) -> Result<()> {
    LogTracer::init()?;
    let env_filter: EnvFilter = (&settings.logging.levels).into();

    match settings.logging.format {
        LogFormat::MozLog => {
            let subscriber = Registry::default()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(MozLogFormatLayer::new("hellogae", std::io::stdout));
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::fmt::Subscriber::builder()
                .pretty()
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt::Subscriber::builder()
                .compact()
                .with_env_filter(env_filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    };

    Ok(())
}
