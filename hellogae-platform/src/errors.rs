//! Errors reported by platform calls.

use std::fmt;
use thiserror::Error;

/// Any failure from talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A metadata server lookup failed.
    #[error("Metadata fetch failed for '{key}': {reason}")]
    MetadataFetch {
        /// The metadata key, relative to `computeMetadata/v1/`.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// The service bridge could not complete the call.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The called service answered with an application level error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A response from the service bridge could not be decoded.
    #[error("Could not decode {what}: {source}")]
    Decode {
        /// The message that failed to decode.
        what: &'static str,
        /// The protobuf error.
        source: prost::DecodeError,
    },

    /// The HTTP client could not be built.
    #[error("Could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// RPC level error codes of the service bridge.
pub mod rpc_code {
    /// Unknown failure, including transport failures.
    pub const UNKNOWN: i32 = 0;
    /// The quota for the call was exhausted.
    pub const OVER_QUOTA: i32 = 4;
    /// The called capability is disabled.
    pub const CAPABILITY_DISABLED: i32 = 6;
    /// The call was cancelled.
    pub const CANCELLED: i32 = 10;
    /// The call ran out of time.
    pub const DEADLINE_EXCEEDED: i32 = 12;
}

/// A failure to complete a call through the service bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    /// One of [`rpc_code`].
    pub code: i32,
    /// Details about the failure.
    pub detail: String,
    /// Whether the call failed by running out of time.
    pub timeout: bool,
}

impl CallError {
    /// A failure that happened before the bridge gave a real answer.
    pub fn unknown<S: Into<String>>(detail: S) -> Self {
        Self {
            code: rpc_code::UNKNOWN,
            detail: detail.into(),
            timeout: false,
        }
    }

    /// A failure reported by the bridge itself.
    pub fn from_rpc(code: i32, detail: String) -> Self {
        Self {
            code,
            detail,
            timeout: code == rpc_code::CANCELLED || code == rpc_code::DEADLINE_EXCEEDED,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.code {
            rpc_code::UNKNOWN => return f.write_str(&self.detail),
            rpc_code::OVER_QUOTA => "Over quota".to_string(),
            rpc_code::CAPABILITY_DISABLED => "Capability disabled".to_string(),
            rpc_code::CANCELLED => "Canceled".to_string(),
            code => format!("Call error {}", code),
        };
        write!(f, "{}: {}", prefix, self.detail)?;
        if self.timeout {
            f.write_str(" (timeout)")?;
        }
        Ok(())
    }
}

impl std::error::Error for CallError {}

/// An application level error returned by a platform service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The service that was called, like `user`.
    pub service: String,
    /// The service specific error code.
    pub code: i32,
    /// Details about the failure.
    pub detail: String,
}

impl ApiError {
    /// The symbolic name of `code` for the services this crate calls.
    fn code_name(&self) -> Option<&'static str> {
        let name = match (self.service.as_str(), self.code) {
            ("user", 0) => "OK",
            ("user", 1) => "REDIRECT_URL_TOO_LONG",
            ("user", 2) => "NOT_ALLOWED",
            ("user", 3) => "OAUTH_INVALID_TOKEN",
            ("user", 4) => "OAUTH_INVALID_REQUEST",
            ("user", 5) => "OAUTH_ERROR",
            ("app_identity_service", 0) => "SUCCESS",
            ("app_identity_service", 9) => "UNKNOWN_SCOPE",
            ("app_identity_service", 1000) => "BLOB_TOO_LARGE",
            ("app_identity_service", 1001) => "DEADLINE_EXCEEDED",
            ("app_identity_service", 1002) => "NOT_A_VALID_APP",
            ("app_identity_service", 1003) => "UNKNOWN_ERROR",
            ("app_identity_service", 1005) => "NOT_ALLOWED",
            ("app_identity_service", 1006) => "NOT_IMPLEMENTED",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            if self.detail.is_empty() {
                return f.write_str("APIError <empty>");
            }
            return f.write_str(&self.detail);
        }
        write!(f, "API error {}", self.code)?;
        match self.code_name() {
            Some(name) => write!(f, " ({}: {})", self.service, name)?,
            None => write!(f, " ({})", self.service)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::{rpc_code, ApiError, CallError, PlatformError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_api_error_names_known_codes() {
        let error = ApiError {
            service: "user".to_string(),
            code: 2,
            detail: String::new(),
        };
        assert_eq!(error.to_string(), "API error 2 (user: NOT_ALLOWED)");
    }

    #[test]
    fn test_api_error_unknown_service() {
        let error = ApiError {
            service: "mail".to_string(),
            code: 7,
            detail: "no quota".to_string(),
        };
        assert_eq!(error.to_string(), "API error 7 (mail): no quota");
    }

    #[test]
    fn test_api_error_zero_code() {
        let mut error = ApiError {
            service: "user".to_string(),
            code: 0,
            detail: String::new(),
        };
        assert_eq!(error.to_string(), "APIError <empty>");
        error.detail = "odd".to_string();
        assert_eq!(error.to_string(), "odd");
    }

    #[test]
    fn test_call_error_display() {
        let transport = CallError::unknown("service bridge HTTP failed: connection refused");
        assert_eq!(
            transport.to_string(),
            "service bridge HTTP failed: connection refused"
        );

        let deadline = CallError::from_rpc(rpc_code::DEADLINE_EXCEEDED, "slow".to_string());
        assert!(deadline.timeout);
        assert_eq!(deadline.to_string(), "Call error 12: slow (timeout)");

        let quota = CallError::from_rpc(rpc_code::OVER_QUOTA, "daily".to_string());
        assert_eq!(quota.to_string(), "Over quota: daily");
    }

    #[test]
    fn test_metadata_error_display() {
        let error = PlatformError::MetadataFetch {
            key: "instance/zone".to_string(),
            reason: "metadata server returned HTTP 404".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Metadata fetch failed for 'instance/zone': metadata server returned HTTP 404"
        );
    }
}
