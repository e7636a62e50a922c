//! Startup decisions: where the process runs and which port it listens on.

use anyhow::{Context, Result};
use hellogae_platform::env::{GAE_APPLICATION, GAE_ENV, GAE_RUNTIME, GAE_VERSION, PORT};
use hellogae_settings::LocalSettings;
use hellogae_web::DeploymentMode;
use std::collections::HashMap;

/// The port the platform's contract falls back to.
const DEFAULT_PORT: u16 = 8080;

/// Values written into the environment when running outside the platform,
/// shaped like what the platform itself would provide.
const LOCAL_OVERLAY: &[(&str, &str)] = &[
    (GAE_APPLICATION, "hellogae"),
    (GAE_RUNTIME, "custom"),
    (GAE_VERSION, "my-version"),
    (GAE_ENV, "standard"),
];

/// Where startup reads and writes environment variables.
pub trait EnvStore {
    /// The value of `key`. Empty values count as unset.
    fn get(&self, key: &str) -> Option<String>;

    /// Set `key` to `value`.
    fn set(&mut self, key: &str, value: &str);
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }

    fn set(&mut self, key: &str, value: &str) {
        // Only called from `main` before the server or any worker thread starts.
        std::env::set_var(key, value);
    }
}

impl EnvStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }
}

/// What startup decided.
#[derive(Debug, PartialEq, Eq)]
pub struct Bootstrap {
    /// Whether the process runs on the platform.
    pub deployment: DeploymentMode,
    /// The port to listen on.
    pub port: u16,
}

impl Bootstrap {
    /// Decide the deployment mode, seeding a local environment if the
    /// platform's application id is missing, then resolve the port.
    ///
    /// Must run before anything snapshots the environment.
    ///
    /// # Errors
    /// If `PORT` is not a valid port number.
    pub fn run<E: EnvStore>(env: &mut E, local: &LocalSettings) -> Result<Self> {
        let deployment = match env.get(GAE_APPLICATION) {
            Some(_) => DeploymentMode::Managed,
            None => {
                seed_local_env(env, local);
                DeploymentMode::Local
            }
        };

        let port = match env.get(PORT) {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid {} {:?}", PORT, port))?,
            None => {
                tracing::info!(
                    r#type = "app.default-port",
                    "Defaulting to port {}",
                    DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        };

        Ok(Self { deployment, port })
    }
}

/// Write the local overlay. Values the platform would own are overwritten,
/// `PORT` is only seeded if it is unset.
fn seed_local_env<E: EnvStore>(env: &mut E, local: &LocalSettings) {
    for (key, value) in LOCAL_OVERLAY {
        env.set(key, value);
    }
    if let Some(port) = local.port {
        if env.get(PORT).is_none() {
            env.set(PORT, &port.to_string());
        }
    }
    tracing::info!(
        r#type = "app.local-mode",
        application = env.get(GAE_APPLICATION).unwrap_or_default(),
        "Running outside the platform with a seeded environment"
    );
}
