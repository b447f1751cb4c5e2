//! Configuration module for Ruster Scan
//!
//! Everything is read from the environment with sensible defaults.
//! API keys are never logged.

use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::models::types::Chain;
use crate::utils::constants::{
    get_chain_name, get_public_rpc_fallback, rpc_env_key, DEFAULT_ANALYZER_TIMEOUT_SECS,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_DEXSCREENER_API_URL, DEFAULT_EXPLORER_API_URL,
    DEFAULT_GOPLUS_API_URL, DEFAULT_HONEYPOT_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SOURCIFY_API_URL, MAX_BATCH_SIZE,
};

/// External service endpoints
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    pub explorer: String,
    pub sourcify: String,
    pub honeypot: String,
    pub goplus: String,
    pub dexscreener: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            explorer: DEFAULT_EXPLORER_API_URL.to_string(),
            sourcify: DEFAULT_SOURCIFY_API_URL.to_string(),
            honeypot: DEFAULT_HONEYPOT_API_URL.to_string(),
            goplus: DEFAULT_GOPLUS_API_URL.to_string(),
            dexscreener: DEFAULT_DEXSCREENER_API_URL.to_string(),
        }
    }
}

/// RPC endpoints for one chain
#[derive(Debug, Clone)]
pub struct ChainRpc {
    pub primary_url: String,
    pub fallback_url: Option<String>,
}

/// Configuration for the scanner service
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Etherscan-style explorer key (optional, unauthenticated calls are heavily throttled)
    pub explorer_api_key: Option<String>,
    pub urls: ServiceUrls,
    pub rpc: HashMap<Chain, ChainRpc>,
    /// Timeout for each outgoing HTTP call
    pub request_timeout: Duration,
    /// Upper bound for one analyzer/oracle contribution
    pub analyzer_timeout: Duration,
    pub cache_ttl_secs: u64,
    pub max_batch_size: usize,
    pub host: String,
    pub port: u16,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            explorer_api_key: None,
            urls: ServiceUrls::default(),
            rpc: Self::default_rpc(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            analyzer_timeout: Duration::from_secs(DEFAULT_ANALYZER_TIMEOUT_SECS),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_batch_size: MAX_BATCH_SIZE,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ScanConfig {
    /// Build configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let explorer_api_key = std::env::var("ETHERSCAN_API_KEY")
            .ok()
            .filter(|k| !k.is_empty() && k != "YOUR_API_KEY");
        if explorer_api_key.is_some() {
            info!("🔑 ETHERSCAN_API_KEY configured (key hidden for security)");
        }

        let urls = ServiceUrls {
            explorer: env_or("ETHERSCAN_API_URL", defaults.urls.explorer),
            sourcify: env_or("SOURCIFY_API_URL", defaults.urls.sourcify),
            honeypot: env_or("HONEYPOT_API_URL", defaults.urls.honeypot),
            goplus: env_or("GOPLUS_API_URL", defaults.urls.goplus),
            dexscreener: env_or("DEXSCREENER_API_URL", defaults.urls.dexscreener),
        };

        let mut rpc = HashMap::new();
        for chain in Chain::ALL {
            let chain_id = chain.chain_id();
            let fallback = get_public_rpc_fallback(chain_id).map(String::from);
            let primary_url = std::env::var(rpc_env_key(chain_id))
                .ok()
                .filter(|u| !u.is_empty())
                .or_else(|| fallback.clone())
                .unwrap_or_default();
            info!("🔗 RPC configured for {}", get_chain_name(chain_id));
            rpc.insert(
                chain,
                ChainRpc {
                    primary_url,
                    fallback_url: fallback,
                },
            );
        }

        Self {
            explorer_api_key,
            urls,
            rpc,
            request_timeout: Duration::from_secs(env_parse(
                "SCAN_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            analyzer_timeout: Duration::from_secs(env_parse(
                "SCAN_ANALYZER_TIMEOUT_SECS",
                DEFAULT_ANALYZER_TIMEOUT_SECS,
            )),
            cache_ttl_secs: env_parse("SCAN_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
            max_batch_size: env_parse("SCAN_MAX_BATCH", MAX_BATCH_SIZE as u64) as usize,
            host: env_or("RUSTER_HOST", defaults.host),
            // Hosting platforms set PORT, RUSTER_PORT is for local dev
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("RUSTER_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    fn default_rpc() -> HashMap<Chain, ChainRpc> {
        Chain::ALL
            .into_iter()
            .map(|chain| {
                let fallback = get_public_rpc_fallback(chain.chain_id()).map(String::from);
                (
                    chain,
                    ChainRpc {
                        primary_url: fallback.clone().unwrap_or_default(),
                        fallback_url: fallback,
                    },
                )
            })
            .collect()
    }

    /// RPC endpoints for a chain
    pub fn rpc_for(&self, chain: Chain) -> Option<&ChainRpc> {
        self.rpc.get(&chain)
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn env_parse(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
