//! Index administration against the search engine's REST API.

use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use vectorbench_workload::{ClientError, IndexClient, RequestContext};

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("vectorbench/", env!("CARGO_PKG_VERSION"));

/// An [`IndexClient`] talking HTTP to a single cluster endpoint.
#[derive(Debug)]
pub struct HttpIndexClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpIndexClient {
    /// Creates a client for the given base URL, applying `timeout` to every request.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url(&self, index: &str) -> String {
        format!("{}/{index}", self.endpoint)
    }
}

fn transport(context: &str, index: &str, cause: reqwest::Error) -> ClientError {
    ClientError::Transport {
        context: format!("{context} `{index}`"),
        cause: Box::new(cause),
    }
}

async fn check_status(response: Response) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait::async_trait]
impl IndexClient for HttpIndexClient {
    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete_index(&self, index: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(index))
            .send()
            .await
            .map_err(|cause| transport("deleting index", index, cause))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(index.to_owned()));
        }
        check_status(response).await
    }

    #[tracing::instrument(level = "trace", skip(self, body))]
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), ClientError> {
        let response = self
            .client
            .put(self.url(index))
            .json(body)
            .send()
            .await
            .map_err(|cause| transport("creating index", index, cause))?;

        check_status(response).await
    }
}

/// A [`RequestContext`] measuring how long each tracked request took.
#[derive(Debug, Default)]
pub struct TimingContext {
    started: Option<Instant>,
    timings: Vec<Duration>,
}

impl TimingContext {
    /// Durations of all completed requests, in order.
    pub fn timings(&self) -> &[Duration] {
        &self.timings
    }

    /// Sum of all completed request durations.
    pub fn total(&self) -> Duration {
        self.timings.iter().sum()
    }
}

impl RequestContext for TimingContext {
    fn on_request_start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn on_request_end(&mut self) {
        if let Some(started) = self.started.take() {
            let elapsed = started.elapsed();
            tracing::debug!(?elapsed, "request finished");
            self.timings.push(elapsed);
        }
    }
}
