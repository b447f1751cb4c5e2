//! RPC Client Module - Multi-Chain JSON-RPC
//!
//! 1. One provider per supported chain, primary URL from `<CHAIN>_HTTP_URL`
//! 2. Fallback to the public RPC of the chain when the primary fails
//! 3. Exponential backoff with jitter on retryable failures only
//! 4. Reverts are reported as `UpstreamNotFound` and never retried
//!
//! `ChainReader` is the seam the resolver and analyzers read through, so tests
//! can swap in an in-memory chain.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::config::ScanConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Chain;

/// Base retry delay in milliseconds
pub const RPC_BASE_RETRY_MS: u64 = 250;

/// Maximum retry delay in milliseconds
pub const RPC_MAX_RETRY_MS: u64 = 2_000;

/// Attempts per endpoint (primary, then fallback)
pub const RPC_MAX_RETRIES: u32 = 3;

/// Jitter percentage for retry delay
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// Block selector for state reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    fn to_param(self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// Read-only chain access used by the resolver and the analyzers
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Deployed bytecode, empty when the address has no code at `block`
    async fn get_code(&self, chain: Chain, address: &str, block: BlockTag) -> AppResult<Vec<u8>>;

    /// Account nonce (for contracts: number of contracts it created + 1)
    async fn get_transaction_count(&self, chain: Chain, address: &str) -> AppResult<u64>;

    async fn block_number(&self, chain: Chain) -> AppResult<u64>;

    /// Raw 32-byte storage word
    async fn get_storage_at(&self, chain: Chain, address: &str, slot: &str) -> AppResult<Vec<u8>>;

    /// `eth_call` against latest state
    async fn call(&self, chain: Chain, to: &str, data: &[u8]) -> AppResult<Vec<u8>>;
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// HTTP 429 equivalents (code -32005 or a rate limit message)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }

    /// The call itself reverted; retrying cannot help
    pub fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_lowercase().contains("revert")
    }

    /// Check if this is a method not found error (code -32601)
    pub fn is_method_not_found(&self) -> bool {
        self.code == -32601
    }

    fn into_app_error(self) -> AppError {
        if self.is_revert() {
            AppError::not_found(format!("execution reverted: {}", self.message))
        } else if self.is_rate_limit() {
            AppError::rate_limited("RPC")
        } else if self.is_method_not_found() {
            AppError::invalid_response(format!("RPC method unsupported: {}", self.message))
        } else {
            AppError::upstream(format!("RPC error: {} (code: {})", self.message, self.code))
        }
    }
}

/// RPC Provider with retry logic and fallback support
#[derive(Clone)]
pub struct RpcProvider {
    primary_url: String,
    fallback_url: Option<String>,
    client: reqwest::Client,
    chain: Chain,
    max_retries: u32,
}

impl RpcProvider {
    pub fn new(
        chain: Chain,
        primary_url: impl Into<String>,
        fallback_url: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let primary_url = primary_url.into();
        // Never retry the same endpoint as its own fallback
        let fallback_url = fallback_url.filter(|f| *f != primary_url);
        Self {
            primary_url,
            fallback_url,
            client,
            chain,
            max_retries: RPC_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Execute JSON-RPC call with retry logic and fallback
    pub async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AppResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let primary_err = match self.call_with_retry(&self.primary_url, &payload).await {
            Ok(result) => return Ok(result),
            Err(e) if !e.code.is_retryable() => return Err(e),
            Err(e) => {
                warn!("⚠️ Primary RPC failed on {}: {}", self.chain, e);
                e
            }
        };

        if let Some(ref fallback) = self.fallback_url {
            info!("🔄 Trying fallback RPC for {}", self.chain);
            match self.call_with_retry(fallback, &payload).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("⚠️ Fallback RPC also failed: {}", e);
                    return Err(e);
                }
            }
        }

        Err(primary_err)
    }

    /// Exponential backoff with jitter, retryable errors only
    async fn call_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> AppResult<T> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let base_delay = RPC_BASE_RETRY_MS * (2_u64.pow(attempt - 1));
                let capped_delay = base_delay.min(RPC_MAX_RETRY_MS);

                let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
                let jitter: i64 =
                    rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
                let final_delay = (capped_delay as i64 + jitter).max(50) as u64;

                debug!(
                    "⏳ Retry {}/{} after {}ms",
                    attempt + 1,
                    self.max_retries,
                    final_delay
                );
                tokio::time::sleep(Duration::from_millis(final_delay)).await;
            }

            match self.execute_call::<T>(url, payload).await {
                Ok(result) => return Ok(result),
                Err(e) if !e.code.is_retryable() => return Err(e),
                Err(e) => {
                    if e.code == ErrorCode::UpstreamRateLimited {
                        warn!(
                            "⏳ Rate limited, backing off (attempt {}/{})",
                            attempt + 1,
                            self.max_retries
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::upstream("RPC retries exhausted")))
    }

    async fn execute_call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> AppResult<T> {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::rate_limited("RPC"));
        }
        if !status.is_success() {
            return Err(AppError::upstream(format!("RPC HTTP error: {}", status)));
        }

        let json: RpcResponse<T> = response.json().await?;

        if let Some(error) = json.error {
            return Err(error.into_app_error());
        }

        json.result
            .ok_or_else(|| AppError::invalid_response("No result in RPC response"))
    }

    /// RPC URL with credentials masked for logging
    pub fn masked_url(&self) -> String {
        mask_url(&self.primary_url)
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }
}

/// Hide path keys (`/v2/<key>`) and query strings
pub fn mask_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    if let Some((base, _)) = without_query.split_once("/v2/") {
        return format!("{}/v2/***HIDDEN***", base);
    }
    without_query.to_string()
}

/// Decode a `0x`-prefixed hex payload
pub fn parse_hex_bytes(value: &str) -> AppResult<Vec<u8>> {
    let stripped = value.trim_start_matches("0x");
    if stripped.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(stripped).map_err(|e| AppError::invalid_response(format!("bad hex: {}", e)))
}

/// Decode a `0x`-prefixed hex quantity
pub fn parse_hex_u64(value: &str) -> AppResult<u64> {
    let stripped = value.trim_start_matches("0x");
    if stripped.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(stripped, 16)
        .map_err(|e| AppError::invalid_response(format!("bad quantity {}: {}", value, e)))
}

/// Multi-chain RPC manager
pub struct RpcManager {
    providers: HashMap<Chain, RpcProvider>,
}

impl RpcManager {
    /// One provider per configured chain, sharing the HTTP client
    pub fn from_config(config: &ScanConfig, client: reqwest::Client) -> Self {
        let mut providers = HashMap::new();
        for (chain, rpc) in &config.rpc {
            if rpc.primary_url.is_empty() {
                warn!("⚠️ No RPC URL for {}", chain);
                continue;
            }
            let provider = RpcProvider::new(
                *chain,
                rpc.primary_url.clone(),
                rpc.fallback_url.clone(),
                client.clone(),
            );
            info!("✅ Initialized RPC for {} ({})", chain, provider.masked_url());
            providers.insert(*chain, provider);
        }
        Self { providers }
    }

    pub fn from_providers(providers: impl IntoIterator<Item = RpcProvider>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.chain(), p)).collect(),
        }
    }

    /// Get provider for a chain
    pub fn get(&self, chain: Chain) -> AppResult<&RpcProvider> {
        self.providers
            .get(&chain)
            .ok_or_else(|| AppError::upstream(format!("No RPC configured for {}", chain)))
    }

    pub fn is_supported(&self, chain: Chain) -> bool {
        self.providers.contains_key(&chain)
    }
}

#[async_trait]
impl ChainReader for RpcManager {
    async fn get_code(&self, chain: Chain, address: &str, block: BlockTag) -> AppResult<Vec<u8>> {
        let params = serde_json::json!([address, block.to_param()]);
        let code: String = self.get(chain)?.request("eth_getCode", params).await?;
        parse_hex_bytes(&code)
    }

    async fn get_transaction_count(&self, chain: Chain, address: &str) -> AppResult<u64> {
        let params = serde_json::json!([address, "latest"]);
        let nonce: String = self
            .get(chain)?
            .request("eth_getTransactionCount", params)
            .await?;
        parse_hex_u64(&nonce)
    }

    async fn block_number(&self, chain: Chain) -> AppResult<u64> {
        let block: String = self
            .get(chain)?
            .request("eth_blockNumber", serde_json::json!([]))
            .await?;
        parse_hex_u64(&block)
    }

    async fn get_storage_at(&self, chain: Chain, address: &str, slot: &str) -> AppResult<Vec<u8>> {
        let params = serde_json::json!([address, slot, "latest"]);
        let word: String = self.get(chain)?.request("eth_getStorageAt", params).await?;
        parse_hex_bytes(&word)
    }

    async fn call(&self, chain: Chain, to: &str, data: &[u8]) -> AppResult<Vec<u8>> {
        let params = serde_json::json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let result: String = self.get(chain)?.request("eth_call", params).await?;
        parse_hex_bytes(&result)
    }
}
