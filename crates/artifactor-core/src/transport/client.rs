//! Retrying HTTP transport and the manager that owns its connection pools

use crate::error::ArtifactError;
use crate::transport::retry::{backoff_delay, is_transient, retry_after, validate_policy};
use artifactor_types::{HttpMethod, RetryPolicy, TransferSettings};
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    /// Replayed on every attempt
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An HTTP client bound to one retry policy.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    policy: Arc<RetryPolicy>,
}

impl HttpTransport {
    /// Build a transport with its own connection pool
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, ArtifactError> {
        validate_policy(&policy)?;

        let client = Client::builder()
            .user_agent(concat!("artifactor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(ArtifactError::Network)?;

        Ok(Self {
            client,
            policy: Arc::new(policy),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue a request by method name (GET, PUT, PATCH or DELETE, any case)
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ArtifactError> {
        let method = HttpMethod::parse(method).ok_or_else(|| {
            ArtifactError::InvalidArgument(format!("Invalid HTTP method: {}", method))
        })?;
        self.send(method, url, options).await
    }

    /// Issue a request, retrying transient failures.
    ///
    /// A terminal non-2xx response is returned, not raised; see
    /// [`augmented_raise_for_status`].
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ArtifactError> {
        let max_retries = self.policy.max_retries;
        let mut retries = 0u32;

        loop {
            let attempt = retries + 1;
            debug!("{} {} (attempt {})", method, url, attempt);

            let mut builder = self
                .client
                .request(to_reqwest_method(method), url)
                .headers(options.headers.clone());
            if let Some(body) = &options.body {
                builder = builder.body(body.clone());
            }
            if let Some(timeout) = options.timeout {
                builder = builder.timeout(timeout);
            }

            let delay = match builder.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !self.policy.is_retriable_status(status) {
                        return Ok(response);
                    }
                    if retries >= max_retries {
                        return Err(ArtifactError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                            attempts: attempt,
                        });
                    }
                    let delay = retry_after(status, response.headers())
                        .unwrap_or_else(|| backoff_delay(retries + 1, self.policy.backoff_factor));
                    warn!(
                        "{} {} returned {}, retrying in {:?} ({}/{})",
                        method,
                        url,
                        status,
                        delay,
                        retries + 1,
                        max_retries
                    );
                    delay
                }
                Err(e) if e.is_builder() => {
                    return Err(ArtifactError::InvalidUrl(format!("{}: {}", url, e)));
                }
                Err(e) => {
                    if !is_transient(&e) || retries >= max_retries {
                        return Err(ArtifactError::Transport {
                            url: url.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = backoff_delay(retries + 1, self.policy.backoff_factor);
                    warn!(
                        "{} {} failed: {}, retrying in {:?} ({}/{})",
                        method,
                        url,
                        e,
                        delay,
                        retries + 1,
                        max_retries
                    );
                    delay
                }
            };

            retries += 1;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Turn a non-2xx response into an error carrying the response body text
pub async fn augmented_raise_for_status(response: Response) -> Result<Response, ArtifactError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    let text = response.text().await.unwrap_or_default();
    let message = if text.trim().is_empty() {
        reason.to_string()
    } else {
        format!("{}. Response text: {}", reason, text)
    };

    Err(ArtifactError::HttpStatus {
        status: status.as_u16(),
        url,
        message,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PolicyKey {
    max_retries: u32,
    backoff_bits: u64,
    status_codes: Vec<u16>,
}

impl From<&RetryPolicy> for PolicyKey {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            backoff_bits: policy.backoff_factor.to_bits(),
            status_codes: policy.retriable_status_codes.iter().copied().collect(),
        }
    }
}

/// Owns one transport per distinct retry policy.
///
/// Connection pools live exactly as long as the manager; hand it (or the
/// transports it returns) to whatever needs HTTP access.
#[derive(Debug)]
pub struct TransportManager {
    timeout: Duration,
    transports: Mutex<HashMap<PolicyKey, HttpTransport>>,
}

impl TransportManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            transports: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &TransferSettings) -> Self {
        Self::new(Duration::from_secs(settings.request_timeout_secs))
    }

    /// Transport for `policy`, reusing the pool of an identical policy
    pub fn transport(&self, policy: &RetryPolicy) -> Result<HttpTransport, ArtifactError> {
        validate_policy(policy)?;

        let key = PolicyKey::from(policy);
        let mut transports = self.transports.lock();
        if let Some(transport) = transports.get(&key) {
            return Ok(transport.clone());
        }

        let transport = HttpTransport::new(policy.clone(), self.timeout)?;
        transports.insert(key, transport.clone());
        debug!("Created transport for {:?}", policy);
        Ok(transport)
    }

    /// Number of distinct pools currently held
    pub fn pool_count(&self) -> usize {
        self.transports.lock().len()
    }
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::from_settings(&TransferSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_reuses_pool_per_policy() {
        let manager = TransportManager::default();

        manager.transport(&RetryPolicy::new(3, 1.0)).unwrap();
        manager.transport(&RetryPolicy::new(3, 1.0)).unwrap();
        assert_eq!(manager.pool_count(), 1);

        manager.transport(&RetryPolicy::new(3, 1.5)).unwrap();
        manager
            .transport(&RetryPolicy::new(3, 1.0).with_status_codes([503]))
            .unwrap();
        assert_eq!(manager.pool_count(), 3);
    }

    #[test]
    fn test_manager_rejects_invalid_policy() {
        let manager = TransportManager::default();
        let result = manager.transport(&RetryPolicy::new(12, 1.0));
        assert!(matches!(result, Err(ArtifactError::InvalidArgument(_))));
        assert_eq!(manager.pool_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let transport = HttpTransport::new(RetryPolicy::new(0, 0.0), Duration::from_secs(5)).unwrap();
        let result = transport
            .request("POST", "http://127.0.0.1:1/", RequestOptions::new())
            .await;
        assert!(matches!(result, Err(ArtifactError::InvalidArgument(_))));
    }
}
