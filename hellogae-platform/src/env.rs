//! The platform's environment contract.

/// Holds the application id, possibly prefixed with a partition and domain.
pub const GAE_APPLICATION: &str = "GAE_APPLICATION";
/// The Google Cloud project id associated with the application.
pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// `standard` on the second generation standard environment.
pub const GAE_ENV: &str = "GAE_ENV";
/// The runtime named in the service manifest.
pub const GAE_RUNTIME: &str = "GAE_RUNTIME";
/// The deployed version.
pub const GAE_VERSION: &str = "GAE_VERSION";
/// Set on flexible environment instances.
pub const GAE_VM: &str = "GAE_VM";
/// The port the platform expects the process to listen on.
pub const PORT: &str = "PORT";
/// Overrides the reported server software.
pub const SERVER_SOFTWARE: &str = "SERVER_SOFTWARE";
/// Set when running under the development app server.
pub const RUN_WITH_DEVAPPSERVER: &str = "RUN_WITH_DEVAPPSERVER";
/// API ticket used when a request doesn't carry one.
pub const DEFAULT_TICKET: &str = "DEFAULT_TICKET";
/// Host of the service bridge.
pub const API_HOST: &str = "API_HOST";
/// Port of the service bridge.
pub const API_PORT: &str = "API_PORT";
/// `host:port` of the metadata server.
pub const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";

/// A snapshot of every environment variable the SDK reads.
///
/// Empty variables are treated as unset, the same way the platform does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    /// `GAE_APPLICATION`.
    pub application: Option<String>,
    /// `GOOGLE_CLOUD_PROJECT`.
    pub google_cloud_project: Option<String>,
    /// `GAE_ENV`.
    pub gae_env: Option<String>,
    /// `GAE_RUNTIME`.
    pub runtime: Option<String>,
    /// `GAE_VERSION`.
    pub version: Option<String>,
    /// `GAE_VM`.
    pub gae_vm: Option<String>,
    /// `SERVER_SOFTWARE`.
    pub server_software: Option<String>,
    /// `RUN_WITH_DEVAPPSERVER`.
    pub run_with_devappserver: Option<String>,
    /// `DEFAULT_TICKET`.
    pub default_ticket: Option<String>,
    /// `API_HOST`.
    pub api_host: Option<String>,
    /// `API_PORT`.
    pub api_port: Option<String>,
    /// `GCE_METADATA_HOST`.
    pub metadata_host: Option<String>,
}

impl RuntimeEnv {
    /// Read the current process environment.
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a snapshot from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            application: get(GAE_APPLICATION),
            google_cloud_project: get(GOOGLE_CLOUD_PROJECT),
            gae_env: get(GAE_ENV),
            runtime: get(GAE_RUNTIME),
            version: get(GAE_VERSION),
            gae_vm: get(GAE_VM),
            server_software: get(SERVER_SOFTWARE),
            run_with_devappserver: get(RUN_WITH_DEVAPPSERVER),
            default_ticket: get(DEFAULT_TICKET),
            api_host: get(API_HOST),
            api_port: get(API_PORT),
            metadata_host: get(GCE_METADATA_HOST),
        }
    }

    /// The application id including any partition or domain prefix, falling
    /// back to the project id.
    pub fn fully_qualified_app_id(&self) -> &str {
        self.application
            .as_deref()
            .or(self.google_cloud_project.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeEnv;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_values_are_unset() {
        let vars: HashMap<&str, &str> = [("GAE_APPLICATION", ""), ("GAE_ENV", "standard")]
            .into_iter()
            .collect();
        let env = RuntimeEnv::from_lookup(|key| vars.get(key).map(ToString::to_string));
        assert_eq!(env.application, None);
        assert_eq!(env.gae_env.as_deref(), Some("standard"));
    }

    #[test]
    fn test_app_id_falls_back_to_project() {
        let env = RuntimeEnv {
            google_cloud_project: Some("my-project".to_string()),
            ..RuntimeEnv::default()
        };
        assert_eq!(env.fully_qualified_app_id(), "my-project");

        let env = RuntimeEnv {
            application: Some("s~hellogov2".to_string()),
            ..env
        };
        assert_eq!(env.fully_qualified_app_id(), "s~hellogov2");
    }
}
