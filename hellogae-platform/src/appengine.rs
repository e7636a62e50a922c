//! Queries about the application, the instance, and the request.
//!
//! Functions that take a [`Context`] may depend on the inbound request. The
//! rest only depend on the process and take the [`Platform`].
//!
//! Several queries come from the metadata server. [`datacenter`] swallows
//! metadata failures, logging them and returning `""`. [`instance_id`],
//! [`module_name`], and [`version_id`] treat them as fatal to the caller,
//! since the platform guarantees the metadata server is reachable and no
//! sensible value can be returned without it.

use crate::{
    proto,
    request::{DEFAULT_VERSION_HOSTNAME, REQUEST_LOG_ID},
    Context, Platform, PlatformError, RuntimeEnv,
};

/// Metadata key of the instance's zone.
const ZONE_KEY: &str = "instance/zone";
/// Metadata key of the instance id.
const INSTANCE_KEY: &str = "instance/attributes/gae_backend_instance";
/// Metadata key of the service name.
const MODULE_KEY: &str = "instance/attributes/gae_backend_name";
/// Metadata key of the full version id.
const VERSION_KEY: &str = "instance/attributes/gae_backend_version";

/// Reported when nothing in the environment names the server software.
const FALLBACK_SERVER_SOFTWARE: &str = "Google App Engine/1.x.x";

/// The application id, without any partition prefix.
///
/// An id with a domain, like `s~example.com:app`, is returned as
/// `example.com:app`.
pub fn app_id(ctx: &Context<'_>) -> String {
    app_id_from(ctx.platform().env())
}

/// The application id from an environment snapshot. See [`app_id`].
pub fn app_id_from(env: &RuntimeEnv) -> String {
    let full = env.fully_qualified_app_id();
    let without_partition = full.split_once('~').map_or(full, |(_, rest)| rest);
    match without_partition.split_once(':') {
        Some((domain, display)) => format!("{}:{}", domain, display),
        None => without_partition.to_string(),
    }
}

/// The zone the instance runs in, like `us-west1-8`.
///
/// Returns `""` if the metadata server can't answer.
pub async fn datacenter(ctx: &Context<'_>) -> String {
    match ctx.platform().metadata().get(ZONE_KEY).await {
        // The value looks like `projects/<number>/zones/<zone>`.
        Ok(zone) => zone.rsplit('/').next().unwrap_or_default().to_string(),
        Err(error) => {
            tracing::warn!(%error, "Could not determine the datacenter");
            String::new()
        }
    }
}

/// The hostname of the application's default version, as told by the
/// platform for this request.
pub fn default_version_hostname(ctx: &Context<'_>) -> String {
    ctx.header(DEFAULT_VERSION_HOSTNAME).to_string()
}

/// The id of the running instance.
///
/// # Errors
/// If the metadata server can't answer.
pub async fn instance_id(platform: &Platform) -> Result<String, PlatformError> {
    platform.metadata().get(INSTANCE_KEY).await
}

/// Whether the process runs on the platform, in either environment.
pub fn is_app_engine(platform: &Platform) -> bool {
    is_standard(platform) || is_flex(platform)
}

/// Whether the process runs under the development app server.
pub fn is_dev_app_server(platform: &Platform) -> bool {
    platform.env().run_with_devappserver.is_some()
}

/// Whether the process runs in the flexible environment.
pub fn is_flex(platform: &Platform) -> bool {
    platform.env().gae_vm.is_some()
}

/// Whether the process runs on a second generation standard runtime.
pub fn is_second_gen(platform: &Platform) -> bool {
    platform.env().gae_env.as_deref() == Some("standard")
}

/// Whether the process runs in the standard environment.
pub fn is_standard(platform: &Platform) -> bool {
    is_second_gen(platform)
}

/// The name of the service serving the request.
///
/// # Errors
/// If the metadata server can't answer.
pub async fn module_name(ctx: &Context<'_>) -> Result<String, PlatformError> {
    module_name_of(ctx.platform()).await
}

/// See [`module_name`].
pub(crate) async fn module_name_of(platform: &Platform) -> Result<String, PlatformError> {
    platform.metadata().get(MODULE_KEY).await
}

/// The platform's id for the request's log entry.
pub fn request_id(ctx: &Context<'_>) -> String {
    ctx.header(REQUEST_LOG_ID).to_string()
}

/// The name of the server software.
pub fn server_software(platform: &Platform) -> String {
    let env = platform.env();
    env.server_software
        .as_deref()
        .or(env.gae_env.as_deref())
        .unwrap_or(FALLBACK_SERVER_SOFTWARE)
        .to_string()
}

/// The email of the application's default service account.
///
/// # Errors
/// If the call through the service bridge fails.
pub async fn service_account(ctx: &Context<'_>) -> Result<String, PlatformError> {
    let response: proto::GetServiceAccountNameResponse = ctx
        .call(
            "app_identity_service",
            "GetServiceAccountName",
            &proto::GetServiceAccountNameRequest {},
        )
        .await?;
    Ok(response.service_account_name.unwrap_or_default())
}

/// The version serving the request, as `<major>.<minor>`.
///
/// # Errors
/// If the metadata server can't answer.
pub async fn version_id(ctx: &Context<'_>) -> Result<String, PlatformError> {
    version_id_of(ctx.platform()).await
}

/// See [`version_id`].
pub(crate) async fn version_id_of(platform: &Platform) -> Result<String, PlatformError> {
    platform.metadata().get(VERSION_KEY).await
}
