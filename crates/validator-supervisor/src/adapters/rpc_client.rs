//! # JSON-RPC Client
//!
//! `RpcTransport` over HTTP using reqwest. Each call is a single POST of a
//! parameterless JSON-RPC 2.0 request; the `result` member is returned as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::RpcError;
use crate::ports::outbound::RpcTransport;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client for the validator's RPC endpoint.
pub struct HttpRpcClient {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str) -> Result<serde_json::Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else if e.is_connect() {
                    RpcError::Connection(format!("cannot connect to {}", self.url))
                } else {
                    RpcError::Http(e.to_string())
                }
            })?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        body.result
            .ok_or_else(|| RpcError::Parse("missing result in response".to_string()))
    }
}
