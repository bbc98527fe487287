//! HTTP client for the CI server

use crate::error::GatewayError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub use reqwest::Method;

/// A single outbound request to the CI server
#[derive(Debug, Clone, PartialEq)]
pub struct CiRequest {
    pub method: Method,
    pub url: String,
    /// Query parameters, sent in order
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Extra headers on top of the bearer credential
    pub headers: Vec<(String, String)>,
}

impl CiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a query parameter by name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) response from the CI server
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Decoded JSON body; `Null` when empty, a JSON string when not JSON
    pub body: serde_json::Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }
}

/// Something that can deliver a [`CiRequest`]
#[async_trait]
pub trait CiGateway: Send + Sync {
    async fn send(&self, request: CiRequest) -> Result<RemoteResponse, GatewayError>;
}

/// reqwest-backed gateway authenticating with a bearer token
pub struct HttpGateway {
    client: reqwest::Client,
    token: String,
}

impl HttpGateway {
    /// Create a gateway with an explicit request timeout
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl CiGateway for HttpGateway {
    async fn send(&self, request: CiRequest) -> Result<RemoteResponse, GatewayError> {
        debug!("CI request: {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .bearer_auth(&self.token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = decode_body(&text);

        if !status.is_success() {
            debug!("CI server answered {} for {}", status, request.url);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: Some(body),
            });
        }

        Ok(RemoteResponse::new(status.as_u16(), body))
    }
}

fn decode_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
