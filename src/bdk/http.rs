// SPDX-License-Identifier: MIT

//! Outbound HTTP for API blocks
//!
//! Blocks talk to the network through the [`HttpClient`] trait so runs can be
//! exercised against a mock transport.

use crate::bdk::error::{CallError, FlowError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// A fully resolved outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Response as seen by a block: status plus decoded body
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by API blocks
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform one request. Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CallError>;
}

/// reqwest-backed client
pub struct ReqwestClient {
    client: Client,
    timeout_ms: u64,
}

impl ReqwestClient {
    pub fn new(timeout_ms: u64) -> Result<Self, FlowError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| FlowError::http(e.to_string()))?;
        Ok(Self { client, timeout_ms })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CallError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| CallError::Network(format!("invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CallError::Timeout(self.timeout_ms)
            } else {
                CallError::from(e)
            }
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = decode_body(&text);

        Ok(HttpResponse { status, body })
    }
}

/// JSON when the body parses, the raw text otherwise
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
