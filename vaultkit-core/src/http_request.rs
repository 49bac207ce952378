use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::chains::ChainError;

const USER_AGENT: &str = concat!("vaultkit-core/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTPS client for chain indexers. Timeouts, a user agent and
/// retries on rate limiting, server errors and connection failures are applied
/// to every call.
pub(crate) struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    /// Retries after the first attempt.
    retries: usize,
    https_only: bool,
}

/// One failed attempt, and whether another one may help.
struct Failure {
    error: ChainError,
    transient: bool,
}

impl Failure {
    fn new(url: &str, status: Option<StatusCode>, error: impl Into<String>) -> Self {
        let transient = status.is_some_and(|status| {
            status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        });
        Self {
            error: ChainError::Network {
                url: url.to_string(),
                status: status.map(|status| status.as_u16()),
                error: error.into(),
            },
            transient,
        }
    }

    fn transport(url: &str, err: &reqwest::Error) -> Self {
        let mut failure = Self::new(url, None, format!("request failed: {err}"));
        failure.transient = err.is_timeout() || err.is_connect();
        failure
    }
}

impl HttpClient {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
            retries: 3,
            https_only: true,
        }
    }

    /// Lifts the HTTPS requirement. For local test servers only.
    #[cfg(test)]
    pub(crate) const fn allow_plain_http(mut self) -> Self {
        self.https_only = false;
        self
    }

    /// GETs `url` with `query` and decodes the JSON body, whatever the status.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<(StatusCode, T), ChainError> {
        if self.https_only && !url.starts_with("https://") {
            return Err(ChainError::Network {
                url: url.to_string(),
                status: None,
                error: "refusing to send a request over plain http".to_string(),
            });
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.retries);

        (|| self.attempt(url, query))
            .retry(backoff)
            .when(|failure| failure.transient)
            .notify(|failure, delay| {
                tracing::debug!(error = %failure.error, ?delay, "retrying indexer request");
            })
            .await
            .map_err(|failure| failure.error)
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<(StatusCode, T), Failure> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|err| Failure::transport(url, &err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Failure::new(url, Some(status), format!("bad status code {status}")));
        }
        let body = response.json().await.map_err(|err| {
            Failure::new(url, Some(status), format!("unexpected response body: {err}"))
        })?;
        Ok((status, body))
    }
}
