/// Source fetcher - downloads recordings named by `sourceUrl`
use bytes::{Bytes, BytesMut};
use mastering_core::MasteringError;
use reqwest::Client;
use std::time::Duration;

/// Upper bound on establishing a connection to the source host
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for remote job input
///
/// The timeout covers the whole exchange including the body, so a stalled
/// host gives its worker back after at most `timeout`.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    http: Client,
    max_bytes: u64,
}

impl SourceFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(format!("MasteringServer/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, max_bytes })
    }

    /// Download a recording, refusing bodies larger than the upload limit
    ///
    /// # Errors
    /// `NotFound` when the host is unreachable, answers with an error status,
    /// or does not finish in time. `Validation` when the body is too large.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, MasteringError> {
        tracing::debug!(url = %url, "Fetching source recording");
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| unreachable_source(url, &e))?;

        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(self.too_large(url));
        }

        // Content-Length can be absent or wrong; count what actually arrives.
        let mut data = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unreachable_source(url, &e))?
        {
            let received = u64::try_from(data.len() + chunk.len()).unwrap_or(u64::MAX);
            if received > self.max_bytes {
                return Err(self.too_large(url));
            }
            data.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, size = data.len(), "Source recording fetched");
        Ok(data.freeze())
    }

    fn too_large(&self, url: &str) -> MasteringError {
        tracing::warn!(url = %url, limit = self.max_bytes, "Source recording too large");
        MasteringError::validation(format!(
            "source recording {} is larger than {} bytes",
            url, self.max_bytes
        ))
    }
}

fn unreachable_source(url: &str, error: &reqwest::Error) -> MasteringError {
    if error.is_timeout() {
        tracing::warn!(url = %url, "Source fetch timed out: {}", error);
    } else {
        tracing::warn!(url = %url, "Source fetch failed: {}", error);
    }
    MasteringError::not_found("Source recording", url)
}
