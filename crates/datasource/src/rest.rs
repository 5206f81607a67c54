//! REST implementation of [`DataSource`].
//!
//! `RestDataSource` wraps a `reqwest::Client` and POSTs each operation's
//! payload to `{base_url}/{endpoint}`, with automatic retry + exponential
//! back-off on transient (5xx / timeout / connection) failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use pa_domain::config::DataServiceConfig;
use pa_domain::error::{Error, Result};
use pa_domain::trace::TraceEvent;
use pa_routing::{BoundSlots, OperationDescriptor};
use reqwest::{Client, RequestBuilder, Response};
use uuid::Uuid;

use crate::provider::DataSource;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Created once at startup; the underlying `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct RestDataSource {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_attempts: u32,
}

impl RestDataSource {
    pub fn new(cfg: &DataServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let api_key = cfg
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty());

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            max_attempts: cfg.max_attempts(),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb
            .header("X-Client-Type", "puo-assist")
            .header("X-Trace-Id", Uuid::new_v4().to_string());
        match &self.api_key {
            Some(key) => rb.bearer_auth(key),
            None => rb,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off.
    ///
    /// * Retries on 5xx, timeouts and connection errors.
    /// * Does **not** retry on 4xx; the body is returned verbatim.
    /// * Emits a `TraceEvent::DataServiceCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 2));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::DataServiceCall {
                        endpoint: endpoint.to_owned(),
                        attempt,
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        tracing::warn!(endpoint, attempt, status = status.as_u16(), "data service error, retrying");
                        last_error = format!("{status}: {body}");
                        continue;
                    }

                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::UpstreamRejected {
                            endpoint: endpoint.to_owned(),
                            status: status.as_u16(),
                            body,
                        });
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::DataServiceCall {
                        endpoint: endpoint.to_owned(),
                        attempt,
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    tracing::warn!(endpoint, attempt, error = %e, "data service unreachable, retrying");
                    last_error = from_reqwest(e).to_string();
                }
            }
        }

        Err(Error::UpstreamUnavailable {
            endpoint: endpoint.to_owned(),
            attempts: self.max_attempts,
            message: last_error,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl DataSource for RestDataSource {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn invoke(
        &self,
        descriptor: &'static OperationDescriptor,
        bound: &BoundSlots,
    ) -> Result<serde_json::Value> {
        let payload = descriptor.payload(bound).map_err(|param| {
            Error::Other(format!(
                "{} called without {}",
                descriptor.name,
                param.as_str()
            ))
        })?;
        let url = self.url(descriptor.endpoint);
        let resp = self
            .execute_with_retry(descriptor.endpoint, || self.http.post(&url).json(&payload))
            .await?;

        let body = resp.text().await.map_err(from_reqwest)?;
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

/// Map a `reqwest::Error` onto the shared error type.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let cfg = DataServiceConfig {
            base_url: "http://svc/continuous_delivery/".into(),
            ..DataServiceConfig::default()
        };
        let ds = RestDataSource::new(&cfg).unwrap();
        assert_eq!(
            ds.url("read_file_components"),
            "http://svc/continuous_delivery/read_file_components"
        );
        assert_eq!(ds.url("/read_file_rn"), "http://svc/continuous_delivery/read_file_rn");
    }

    #[test]
    fn attempts_follow_config() {
        let cfg = DataServiceConfig {
            max_retries: 2,
            ..DataServiceConfig::default()
        };
        assert_eq!(RestDataSource::new(&cfg).unwrap().max_attempts(), 3);
    }
}
