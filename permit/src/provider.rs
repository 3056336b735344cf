//! Chain access over JSON-RPC.
//!
//! Signing itself is offline; the provider only confirms that a configured
//! endpoint serves the expected network before an authorization is issued.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PermitError, Result};

/// Minimal view of a chain endpoint.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;

    /// Chain id reported by the endpoint.
    async fn chain_id(&self) -> Result<u64>;
}

/// JSON-RPC endpoint over HTTP.
pub struct JsonRpcProvider {
    client: Client,
    url: String,
}

impl JsonRpcProvider {
    /// Endpoint whose calls give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PermitError::Rpc(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[async_trait]
impl ChainProvider for JsonRpcProvider {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn chain_id(&self) -> Result<u64> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_chainId",
            "params": [],
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PermitError::RpcTimeout(self.url.clone())
                } else {
                    PermitError::Rpc(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(PermitError::Rpc(format!("HTTP {}", response.status())));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| PermitError::Rpc(e.to_string()))?;

        if let Some(error) = rpc.error {
            return Err(PermitError::Rpc(format!("{} ({})", error.message, error.code)));
        }

        let result = rpc
            .result
            .ok_or_else(|| PermitError::Rpc("missing result".into()))?;
        let digits = result.trim_start_matches("0x");
        u64::from_str_radix(digits, 16)
            .map_err(|_| PermitError::Rpc(format!("malformed chain id {result}")))
    }
}

/// A provider with a fixed chain id, for offline runs and tests.
pub struct StaticProvider {
    chain_id: u64,
}

impl StaticProvider {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }
}

#[async_trait]
impl ChainProvider for StaticProvider {
    fn endpoint(&self) -> &str {
        "static"
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }
}

/// Resolves a working provider for a network.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn connect(&self, network_id: u64) -> Result<Arc<dyn ChainProvider>>;
}

/// Tries configured endpoints in order; the first one serving the network wins.
///
/// One pass over the list is bounded by `timeout` per endpoint. Retrying the
/// pass is up to the caller.
pub struct RpcEndpoints {
    urls: Vec<String>,
    timeout: Duration,
}

impl RpcEndpoints {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Self {
        Self { urls, timeout }
    }
}

#[async_trait]
impl ProviderFactory for RpcEndpoints {
    async fn connect(&self, network_id: u64) -> Result<Arc<dyn ChainProvider>> {
        for url in &self.urls {
            let provider = JsonRpcProvider::new(url.clone(), self.timeout)?;
            match provider.chain_id().await {
                Ok(id) if id == network_id => {
                    debug!(endpoint = %url, network_id, "Connected to RPC endpoint");
                    return Ok(Arc::new(provider));
                }
                Ok(actual) => {
                    warn!(endpoint = %url, expected = network_id, actual, "Endpoint serves another network");
                }
                Err(e) => {
                    warn!(endpoint = %url, error = %e, "RPC endpoint unavailable");
                }
            }
        }
        Err(PermitError::NoEndpoint(network_id))
    }
}

/// Factory that always hands out a [`StaticProvider`].
pub struct StaticProviderFactory {
    chain_id: u64,
}

impl StaticProviderFactory {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }
}

#[async_trait]
impl ProviderFactory for StaticProviderFactory {
    async fn connect(&self, network_id: u64) -> Result<Arc<dyn ChainProvider>> {
        if network_id != self.chain_id {
            return Err(PermitError::NetworkMismatch {
                expected: network_id,
                actual: self.chain_id,
            });
        }
        Ok(Arc::new(StaticProvider::new(self.chain_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn chain(id_hex: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_chainId" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": id_hex,
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_chain_id_is_decoded() {
        let server = chain("0x64").await;
        let provider = JsonRpcProvider::new(server.uri(), TIMEOUT).unwrap();
        assert_eq!(provider.chain_id().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_connect_skips_wrong_network() {
        let mainnet = chain("0x1").await;
        let gnosis = chain("0x64").await;

        let endpoints = RpcEndpoints::new(vec![mainnet.uri(), gnosis.uri()], TIMEOUT);
        let provider = endpoints.connect(100).await.unwrap();
        assert_eq!(provider.endpoint(), gnosis.uri());
    }

    #[tokio::test]
    async fn test_connect_fails_without_endpoint() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        for server in [&first, &second] {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(503))
                .expect(1)
                .mount(server)
                .await;
        }

        let endpoints = RpcEndpoints::new(vec![first.uri(), second.uri()], TIMEOUT);
        let err = endpoints.connect(100).await.err().unwrap();
        assert!(matches!(err, PermitError::NoEndpoint(100)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rpc_error_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32601, "message": "method not found" },
            })))
            .mount(&server)
            .await;

        let provider = JsonRpcProvider::new(server.uri(), TIMEOUT).unwrap();
        assert!(matches!(provider.chain_id().await, Err(PermitError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out_and_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x64" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let provider = JsonRpcProvider::new(server.uri(), Duration::from_millis(100)).unwrap();
        let err = tokio_test::assert_err!(provider.chain_id().await);
        assert!(matches!(err, PermitError::RpcTimeout(_)));
        assert!(err.is_transient());

        let endpoints = RpcEndpoints::new(vec![server.uri()], Duration::from_millis(100));
        let started = std::time::Instant::now();
        let result = RetryPolicy::immediate(2)
            .run("rpc connect", || endpoints.connect(100), PermitError::is_transient)
            .await;

        assert!(matches!(result, Err(PermitError::NoEndpoint(100))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
