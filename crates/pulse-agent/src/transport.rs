use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Maximum number of characters of a rejected response body kept in logs.
const MAX_BODY_LOG_CHARS: usize = 200;

/// A failed delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS or protocol failure before a status was received.
    #[error("Transport: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The collector answered with anything other than 200.
    #[error("Transport: collector rejected batch with status {status}")]
    Rejected { status: u16 },

    /// The attempt did not finish within its time budget.
    #[error("Transport: attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The configured collector endpoint is not an absolute URL.
    #[error("Transport: invalid collector URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Sends one serialized batch to the collector.
///
/// Returns the HTTP status code; deciding whether that status counts as
/// delivery is left to the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, body: &[u8], credential: &str) -> Result<u16, TransportError>;
}

/// [`Transport`] that POSTs JSON to a fixed URL with bearer authentication.
pub struct HttpTransport {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pulse-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, body: &[u8], credential: &str) -> Result<u16, TransportError> {
        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(credential)
            .body(body.to_vec())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = match resp.text().await {
                Ok(text) => truncate_body(&text, MAX_BODY_LOG_CHARS),
                Err(e) => format!("[failed to read response body: {e}]"),
            };
            tracing::debug!(status = status.as_u16(), body = %text, "Collector response");
        }
        Ok(status.as_u16())
    }
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_body(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
