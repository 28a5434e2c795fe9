//! HTTP request execution with bounded retries and exponential backoff.

use std::time::Duration;

use thiserror::Error;

/// Request error types.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request cannot be retried")]
    NotRetryable,
}

/// Retry schedule for a single outbound request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(400),
            multiplier: 1.6,
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep before retrying after the given zero-based
    /// failed attempt.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let millis =
            self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_backoff)
    }
}

/// Executes one logical request with retries.
///
/// Calls are independent: there is no coalescing or in-flight
/// de-duplication, each call runs its own retry loop and timers. The
/// backoff sleeps are plain tokio timers, so dropping the future
/// cancels them outright.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl RequestExecutor {
    /// Build an executor with the given per-attempt timeout.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kumawatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, policy })
    }

    /// The underlying client, for building requests against it.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute the request, returning the body text of the first 2xx
    /// response. Non-2xx responses and transport failures both consume
    /// an attempt; after the last attempt the most recent error is
    /// surfaced.
    pub async fn execute(&self, request: reqwest::Request) -> Result<String, RequestError> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error: Option<RequestError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.policy.backoff_for(attempt - 1);
                tracing::debug!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    url = %request.url(),
                    "retrying request after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            let Some(cloned) = request.try_clone() else {
                return Err(RequestError::NotRetryable);
            };

            match self.client.execute(cloned).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }
                    last_error = Some(RequestError::Status(status));
                }
                Err(e) => last_error = Some(RequestError::Transport(e)),
            }
        }

        Err(last_error.unwrap_or(RequestError::NotRetryable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve every incoming connection with a fixed canned response.
    async fn canned_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(640));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1024));
        // Deep retries are capped.
        assert_eq!(policy.backoff_for(10), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_returns_body_on_success() {
        let url = canned_server("200 OK", "hello").await;
        let executor =
            RequestExecutor::new(Duration::from_secs(2), RetryPolicy::default()).unwrap();
        let request = executor.client().get(&url).build().unwrap();
        assert_eq!(executor.execute(request).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_exhausts_retries_on_server_error() {
        let url = canned_server("500 Internal Server Error", "").await;
        let executor =
            RequestExecutor::new(Duration::from_secs(2), RetryPolicy::default()).unwrap();
        let request = executor.client().get(&url).build().unwrap();

        let started = Instant::now();
        let err = executor.execute(request).await.unwrap_err();
        assert!(matches!(err, RequestError::Status(code) if code.as_u16() == 500));
        // Three attempts mean two backoff waits: 400ms then 640ms.
        assert!(started.elapsed() >= Duration::from_millis(1040));
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_error() {
        let url = canned_server("404 Not Found", "missing").await;
        let policy = RetryPolicy {
            attempts: 1,
            ..RetryPolicy::default()
        };
        let executor = RequestExecutor::new(Duration::from_secs(2), policy).unwrap();
        let request = executor.client().get(&url).build().unwrap();
        let err = executor.execute(request).await.unwrap_err();
        assert!(matches!(err, RequestError::Status(code) if code.as_u16() == 404));
    }

    #[tokio::test]
    async fn test_connection_failure_surfaces_transport_error() {
        // Bind a port, then drop the listener so connections are refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let policy = RetryPolicy {
            attempts: 2,
            initial_backoff: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        let executor = RequestExecutor::new(Duration::from_secs(1), policy).unwrap();
        let request = executor.client().get(&url).build().unwrap();
        let err = executor.execute(request).await.unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)));
    }
}
