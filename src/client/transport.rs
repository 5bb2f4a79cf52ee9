//! HTTP transport: a pooled blocking client with status-based retries.

use crate::client::retry::{RetryPolicy, Sleeper};
use crate::error::Result;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Statuses retried for every supported verb.
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Connection settings for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub endpoint_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub ssl_verify: bool,
    pub retry: RetryPolicy,
}

/// A request relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub json: Option<Value>,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            json: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn query_opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Owns the HTTP connection pool for one CLI invocation.
pub struct Transport {
    http: Client,
    base_url: String,
    read_timeout: Duration,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    session_headers: HeaderMap,
}

impl Transport {
    pub fn new(config: &TransportConfig, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        // Streaming reads must outlive any fixed deadline, so the client has
        // no global timeout; plain requests set one per call.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None::<Duration>)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: config.endpoint_url.trim_end_matches('/').to_string(),
            read_timeout: config.read_timeout,
            retry: config.retry,
            sleeper,
            session_headers: HeaderMap::new(),
        })
    }

    /// Attach headers sent with every later request. Set once, never refreshed.
    pub fn with_session_headers(mut self, headers: HeaderMap) -> Self {
        self.session_headers = headers;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build(&self, request: &Request) -> RequestBuilder {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .headers(self.session_headers.clone())
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }
        builder
    }

    /// Send a request, retrying 5xx gateway-style failures and connection errors.
    ///
    /// Once the retry budget is spent on a 5xx the last response is returned
    /// as-is; connection errors that survive the budget are returned as errors.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let can_retry = attempt <= self.retry.max_retries;
            let result = self.build(request).timeout(self.read_timeout).send();

            match result {
                Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                    if !can_retry {
                        warn!(
                            "{} {} still failing with {} after {} retries",
                            request.method,
                            request.path,
                            response.status(),
                            self.retry.max_retries
                        );
                        return Ok(response);
                    }
                    let delay = self.retry.delay(attempt);
                    debug!(
                        "{} {} returned {}, retry {} in {:?}",
                        request.method,
                        request.path,
                        response.status(),
                        attempt,
                        delay
                    );
                    drop(response);
                    self.sleeper.sleep(delay);
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && can_retry => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        "{} {} connection failed ({}), retry {} in {:?}",
                        request.method, request.path, e, attempt, delay
                    );
                    self.sleeper.sleep(delay);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Open a streaming response: one attempt, no read deadline, no status retries.
    pub fn open_stream(&self, request: &Request) -> Result<Response> {
        debug!("opening stream {} {}", request.method, request.path);
        Ok(self.build(request).send()?)
    }
}
