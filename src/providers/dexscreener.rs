//! DexScreener API Client
//!
//! Pool discovery only: which pair holds the most liquidity for a token on a
//! chain, and how much USD sits in it. Lock status is read on-chain from the
//! pair's LP token, never from DexScreener.
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Chain;
use crate::providers::http::{get_json, Fetched};

const SERVICE: &str = "dexscreener";

/// DexScreener API response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    /// DexScreener chain slug (e.g., "ethereum", "polygon")
    pub chain_id: String,
    /// DEX identifier (e.g., "uniswap", "sushiswap")
    pub dex_id: String,
    /// Pair address (the LP token for V2-style pools)
    pub pair_address: String,
    /// Labels (e.g., ["v3"] for Uniswap V3)
    #[serde(default)]
    pub labels: Vec<String>,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    pub liquidity: Option<DexLiquidity>,
    pub price_usd: Option<String>,
}

impl DexPair {
    /// Pool shares are a fungible ERC20 (not V3/V4 NFT positions, not Solidly-style gauges)
    pub fn is_v2_compatible(&self) -> bool {
        let is_v3 = self.labels.iter().any(|l| l.contains("v3") || l.contains("v4"));

        let is_velodrome_style = matches!(
            self.dex_id.to_lowercase().as_str(),
            "velodrome" | "aerodrome" | "ramses" | "thena" | "equalizer"
        );

        !is_v3 && !is_velodrome_style
    }

    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

/// DexScreener chain slug for a supported chain
pub fn dexscreener_chain_slug(chain: Chain) -> &'static str {
    match chain {
        Chain::Ethereum => "ethereum",
        Chain::Polygon => "polygon",
        Chain::Arbitrum => "arbitrum",
        Chain::Optimism => "optimism",
        Chain::Base => "base",
    }
}

/// Pool discovery seam for the liquidity analyzer
#[async_trait]
pub trait PairSource: Send + Sync {
    /// Pairs on `chain`, highest liquidity first
    async fn pairs_for_chain(&self, chain: Chain, token: &str) -> AppResult<Vec<DexPair>>;

    /// Best pair: highest-liquidity V2-compatible pair, else highest overall
    async fn best_pair(&self, chain: Chain, token: &str) -> AppResult<Option<DexPair>> {
        let pairs = self.pairs_for_chain(chain, token).await?;
        let best_v2 = pairs.iter().find(|p| p.is_v2_compatible()).cloned();
        Ok(best_v2.or_else(|| pairs.into_iter().next()))
    }
}

/// DexScreener API client
#[derive(Clone)]
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch all pairs for a token address, sorted by liquidity (highest first)
    pub async fn get_token_pairs(&self, token_address: &str) -> AppResult<Vec<DexPair>> {
        let url = format!("{}/tokens/{}", self.base_url, token_address);

        info!("🔍 DexScreener: Fetching pairs for {}", token_address);

        let data: DexScreenerResponse = match get_json(&self.client, SERVICE, &url, &[]).await? {
            Fetched::Found(data) => data,
            Fetched::NotFound => return Ok(Vec::new()),
            Fetched::RateLimited => return Err(AppError::rate_limited(SERVICE)),
        };

        let mut pairs = data.pairs.unwrap_or_default();

        pairs.sort_by(|a, b| {
            b.liquidity_usd()
                .partial_cmp(&a.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!("📊 DexScreener: Found {} pairs", pairs.len());

        Ok(pairs)
    }
}

#[async_trait]
impl PairSource for DexScreenerClient {
    async fn pairs_for_chain(&self, chain: Chain, token: &str) -> AppResult<Vec<DexPair>> {
        let slug = dexscreener_chain_slug(chain);
        let pairs: Vec<DexPair> = self
            .get_token_pairs(token)
            .await?
            .into_iter()
            .filter(|p| p.chain_id.eq_ignore_ascii_case(slug))
            .collect();

        info!("📊 DexScreener: {} pairs on {}", pairs.len(), chain);
        Ok(pairs)
    }
}
