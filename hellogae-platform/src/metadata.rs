//! A client for the instance metadata server.

use crate::errors::PlatformError;
use reqwest::{Client, StatusCode};

/// Host of the metadata server inside the platform.
pub const DEFAULT_METADATA_HOST: &str = "metadata";

/// Path prefix of every metadata key.
const METADATA_PATH: &str = "/computeMetadata/v1/";

/// Reads instance metadata over plain HTTP.
#[derive(Clone, Debug)]
pub struct MetadataClient {
    /// Shared HTTP client.
    client: Client,
    /// `host[:port]` of the metadata server.
    host: String,
}

impl MetadataClient {
    /// Create a client for the metadata server at `host`.
    pub fn new(client: Client, host: Option<&str>) -> Self {
        Self {
            client,
            host: host.unwrap_or(DEFAULT_METADATA_HOST).to_string(),
        }
    }

    /// Fetch the value stored at `key`, like `instance/zone`.
    ///
    /// # Errors
    /// If the server can't be reached, doesn't answer 200, or the body can't
    /// be read.
    pub async fn get(&self, key: &str) -> Result<String, PlatformError> {
        let fail = |reason: String| PlatformError::MetadataFetch {
            key: key.to_string(),
            reason,
        };

        let url = format!("http://{}{}{}", self.host, METADATA_PATH, key);
        tracing::trace!(%url, "Fetching metadata");
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|error| fail(format!("Get {:?}: {}", url, error)))?;

        if response.status() != StatusCode::OK {
            return Err(fail(format!(
                "metadata server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        response.text().await.map_err(|error| fail(error.to_string()))
    }
}
