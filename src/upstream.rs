//! Shared blocking HTTP plumbing for the upstream market-data providers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP client build error: {0}")]
    ClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    Request { url: String, message: String },
    #[error("invalid payload from {url}: {message}")]
    InvalidPayload { url: String, message: String },
}

pub trait HttpFetcher: Send + Sync {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, UpstreamError>;
}

pub struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self, UpstreamError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| UpstreamError::ClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| UpstreamError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Request {
                url: url.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| UpstreamError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 200,
        }
    }
}

pub fn fetch_with_retry(
    fetcher: &dyn HttpFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<Vec<u8>, UpstreamError> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher.get_bytes(url) {
            Ok(bytes) => return Ok(bytes),
            Err(err) if attempt >= policy.max_retries => return Err(err),
            Err(_) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                let sleep_ms = policy.backoff_ms.saturating_mul(factor);
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}
