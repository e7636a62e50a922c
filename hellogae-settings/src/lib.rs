//! # hellogae Settings
//!
//! Settings come from two places, with later ones overriding earlier ones.
//!
//! 1. Defaults built into this crate. These describe a development setup that
//!    listens on all interfaces and uses the bare listener entry point.
//! 2. Environment variables that begin with `HELLOGAE_` and use `__` to
//!    separate levels. For example, `Settings::http::workers` can be controlled
//!    from the environment variable `HELLOGAE_HTTP__WORKERS`.
//!
//! There are no configuration files. The platform's own variables (`PORT`,
//! `GAE_APPLICATION`, `GAE_ENV`, ...) are not settings either. They belong to
//! the hosting platform's contract and are read directly by the bootstrapper
//! and by `hellogae-platform`.
//!
//! Tests should use `Settings::load_for_tests`, which only applies the built
//! in defaults and never reads from environment variables.

mod logging;

pub use logging::{DirectiveWrapper, LogFormat, LoggingSettings};

use config::{Config, ConfigBuilder, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Top level settings object for hellogae.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// The environment hellogae is running in. Should only be set with the
    /// `HELLOGAE_ENV` environment variable.
    pub env: String,

    /// Settings for the HTTP server.
    pub http: HttpSettings,

    /// Which startup path the server takes. Changes what the platform SDK can
    /// see about each request.
    pub entry_point: EntryPoint,

    /// Values used only when the process detects it is running outside the
    /// managed platform.
    #[serde(default)]
    pub local: LocalSettings,

    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Settings for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpSettings {
    /// The address to listen on. The port is not a setting, it always comes
    /// from the platform's `PORT` variable.
    pub host: IpAddr,

    /// The number of workers to use. Optional. If no value is provided, the
    /// number of logical cores will be used.
    #[serde(default)]
    pub workers: Option<usize>,
}

/// How the HTTP server is started.
///
/// The hosting platform offers two ways to serve traffic, and the values its
/// SDK reports differ between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    /// The platform's managed entry point. Every request is wrapped so that
    /// the platform's per-request headers (API ticket, request log id, end
    /// user identity) are visible to the SDK.
    Managed,

    /// A plain HTTP listener. The SDK sees nothing about the request beyond
    /// the process environment and the metadata server.
    Bare,
}

/// Settings that only apply in local mode.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalSettings {
    /// A port to seed into `PORT` when running locally and `PORT` is not
    /// already set. If unset, the server falls back to the platform default.
    #[serde(default)]
    pub port: Option<u16>,
}

impl Settings {
    /// Load settings from the built in defaults and environment variables.
    ///
    /// # Errors
    /// If any of the configured values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("HELLOGAE_ENV").unwrap_or_else(|_| "development".to_string());

        // Add environment variables that start with "HELLOGAE_" and have "__"
        // to separate levels. For example, `HELLOGAE_HTTP__WORKERS` maps to
        // `Settings::http::workers`.
        Self::defaults()?
            .set_override("env", env)?
            .add_source(
                Environment::with_prefix("HELLOGAE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Load settings for tests.
    ///
    /// Only the built in defaults are used. `changer` can then adjust the
    /// result before it is returned.
    ///
    /// # Panics
    /// If the defaults cannot be turned into settings.
    pub fn load_for_tests<F: FnOnce(&mut Self)>(changer: F) -> Self {
        let mut settings: Self = Self::defaults()
            .and_then(|builder| builder.set_override("env", "test"))
            .and_then(|builder| builder.set_override("http.host", "127.0.0.1"))
            .and_then(|builder| builder.build())
            .and_then(Config::try_deserialize)
            .expect("Could not build test settings");
        changer(&mut settings);
        settings
    }

    /// The base configuration every environment starts from.
    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("env", "development")?
            .set_default("http.host", "0.0.0.0")?
            .set_default("entry_point", "bare")?
            .set_default("logging.levels", vec!["INFO"])?
            .set_default("logging.format", "pretty")
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryPoint, LogFormat, Settings};
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_defaults() {
        let settings = Settings::load_for_tests(|_| ());
        assert_eq!(settings.env, "test");
        assert_eq!(settings.http.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(settings.http.workers, None);
        assert_eq!(settings.entry_point, EntryPoint::Bare);
        assert_eq!(settings.local.port, None);
        assert!(matches!(settings.logging.format, LogFormat::Pretty));
    }

    #[test]
    fn test_changer_is_applied() {
        let settings = Settings::load_for_tests(|settings| {
            settings.entry_point = EntryPoint::Managed;
            settings.local.port = Some(4200);
        });
        assert_eq!(settings.entry_point, EntryPoint::Managed);
        assert_eq!(settings.local.port, Some(4200));
    }

    #[test]
    fn test_entry_point_names() {
        let managed: EntryPoint = serde_json::from_str("\"managed\"").expect("managed parses");
        let bare: EntryPoint = serde_json::from_str("\"bare\"").expect("bare parses");
        assert_eq!(managed, EntryPoint::Managed);
        assert_eq!(bare, EntryPoint::Bare);
        assert!(serde_json::from_str::<EntryPoint>("\"main\"").is_err());
    }
}
