//! Per-request values the platform passes in HTTP headers.

use actix_web::http::header::HeaderMap;
use std::collections::HashMap;

/// Ticket authorizing service bridge calls made on behalf of a request.
pub const API_TICKET: &str = "X-AppEngine-API-Ticket";
/// The platform's identifier for the request's log entry.
pub const REQUEST_LOG_ID: &str = "X-AppEngine-Request-Log-Id";
/// Hostname of the application's default version.
pub const DEFAULT_VERSION_HOSTNAME: &str = "X-AppEngine-Default-Version-Hostname";
/// Email of the signed in end user.
pub const USER_EMAIL: &str = "X-AppEngine-User-Email";
/// Auth domain of the signed in end user.
pub const USER_AUTH_DOMAIN: &str = "X-AppEngine-Auth-Domain";
/// Stable id of the signed in end user.
pub const USER_ID: &str = "X-AppEngine-User-Id";
/// `1` when the signed in end user administers the application.
pub const USER_IS_ADMIN: &str = "X-AppEngine-User-Is-Admin";
/// Federated identity of the signed in end user.
pub const USER_FEDERATED_IDENTITY: &str = "X-AppEngine-Federated-Identity";
/// Federated provider of the signed in end user.
pub const USER_FEDERATED_PROVIDER: &str = "X-AppEngine-Federated-Provider";

/// Every header [`RequestInfo`] keeps.
pub const CAPTURED_HEADERS: &[&str] = &[
    API_TICKET,
    REQUEST_LOG_ID,
    DEFAULT_VERSION_HOSTNAME,
    USER_EMAIL,
    USER_AUTH_DOMAIN,
    USER_ID,
    USER_IS_ADMIN,
    USER_FEDERATED_IDENTITY,
    USER_FEDERATED_PROVIDER,
];

/// The platform headers of one inbound request.
///
/// Only the managed entry point attaches this to requests. A context built
/// without it sees empty values for everything here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// Captured header values, keyed by the constants in this module.
    headers: HashMap<&'static str, String>,
}

impl RequestInfo {
    /// Capture the platform headers present in `headers`. Values that are not
    /// visible ASCII are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let headers = CAPTURED_HEADERS
            .iter()
            .filter_map(|&name| {
                let value = headers.get(name)?.to_str().ok()?;
                Some((name, value.to_string()))
            })
            .collect();
        Self { headers }
    }

    /// The value of a captured header, or `""` if it was absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
