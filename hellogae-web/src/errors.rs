//! Any errors that hellogae-web might generate, and supporting implementations.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use backtrace::Backtrace;
use hellogae_platform::PlatformError;
use serde_json::Value;
use thiserror::Error;

/// The standard error for the web handlers.
pub struct HandlerError {
    /// The wrapped error value.
    kind: HandlerErrorKind,
    /// The backtrace related to the wrapped error.
    pub(crate) backtrace: Backtrace,
}

/// An error that happened in a web handler.
#[derive(Error, Debug)]
pub enum HandlerErrorKind {
    /// A generic error, when there is nothing more specific to say.
    #[error("Internal error")]
    Internal,

    /// A platform call that has no way to report failure in the report
    /// failed, so the report can't be finished.
    #[error("Platform call failed: {0}")]
    Probe(#[from] PlatformError),
}

impl HandlerErrorKind {
    /// Convert the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal | Self::Probe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl HandlerError {
    /// Access the wrapped error.
    pub fn kind(&self) -> &HandlerErrorKind {
        &self.kind
    }

    /// Get an `HandlerError` representing an `Internal` error.
    pub fn internal() -> Self {
        HandlerErrorKind::Internal.into()
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.kind.source()
    }
}

impl<T> From<T> for HandlerError
where
    HandlerErrorKind: From<T>,
{
    fn from(item: T) -> Self {
        HandlerError {
            kind: HandlerErrorKind::from(item),
            backtrace: Backtrace::new(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        // Formatted as `HandlerError/<kind>` so request logs distinguish
        // error kinds by the `exception.details` field alone.
        fmt.debug_struct(&format!("HandlerError/{:?}", &self.kind))
            .field("kind", &self.kind)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HashMap::new();
        response.insert(
            "error".to_owned(),
            Value::String(format!("{}", self.kind())),
        );
        HttpResponse::build(self.status_code()).json(response)
    }
}

#[cfg(test)]
mod tests {
    use super::{HandlerError, HandlerErrorKind};
    use actix_web::{body::to_bytes, http::StatusCode, ResponseError};
    use hellogae_platform::PlatformError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[actix_rt::test]
    async fn test_probe_error_is_a_json_500() {
        let error: HandlerError = PlatformError::MetadataFetch {
            key: "instance/attributes/gae_backend_instance".to_string(),
            reason: "metadata server returned HTTP 404".to_string(),
        }
        .into();
        assert!(matches!(error.kind(), HandlerErrorKind::Probe(_)));

        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body()).await.expect("body");
        let body: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(
            body,
            json!({
                "error": format!("Platform call failed: {}", PlatformError::MetadataFetch {
                    key: "instance/attributes/gae_backend_instance".to_string(),
                    reason: "metadata server returned HTTP 404".to_string(),
                })
            })
        );
    }

    #[test]
    fn test_debug_names_the_kind() {
        let error = HandlerError::internal();
        assert!(format!("{:?}", error).starts_with("HandlerError/Internal"));
    }
}
