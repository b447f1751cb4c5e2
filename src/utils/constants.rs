//! Constants Module - Single Source of Truth
//!
//! Chain identifiers, service endpoints, scoring thresholds and the static
//! allow-list / keyword tables. Tables are exposed through pure lookup
//! functions so callers never touch the raw sets.

use lazy_static::lazy_static;
use std::collections::HashSet;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "RusterScan";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outgoing HTTP requests
pub const USER_AGENT: &str = "RusterScan/0.1.0";

// ============================================
// TIMEOUTS, CACHE, LIMITS
// ============================================

/// Per-request timeout for explorer/oracle/RPC calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for a whole analyzer or oracle contribution (seconds)
pub const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 20;

/// Result cache TTL (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Interval of the background cache sweep (seconds)
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Maximum contracts per batch request
pub const MAX_BATCH_SIZE: usize = 10;

/// Creator-history fan-out bound
pub const MAX_CREATOR_CONTRACTS_INSPECTED: usize = 20;

/// Transactions pulled for behavioral analysis
pub const BEHAVIOR_TX_SAMPLE: usize = 100;

/// Top holders pulled for concentration analysis
pub const HOLDER_SAMPLE: usize = 10;

// ============================================
// CHAIN IDS
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// Polygon PoS
pub const CHAIN_ID_POLYGON: u64 = 137;
/// Arbitrum One
pub const CHAIN_ID_ARBITRUM: u64 = 42161;
/// Optimism
pub const CHAIN_ID_OPTIMISM: u64 = 10;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;

/// Get public RPC fallback URL for a chain
pub fn get_public_rpc_fallback(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("https://eth.llamarpc.com"),
        CHAIN_ID_POLYGON => Some("https://polygon-rpc.com"),
        CHAIN_ID_ARBITRUM => Some("https://arb1.arbitrum.io/rpc"),
        CHAIN_ID_OPTIMISM => Some("https://mainnet.optimism.io"),
        CHAIN_ID_BASE => Some("https://mainnet.base.org"),
        _ => None,
    }
}

/// Env var holding a private RPC URL for a chain
pub fn rpc_env_key(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_ETHEREUM => "ETH_HTTP_URL",
        CHAIN_ID_POLYGON => "POLYGON_HTTP_URL",
        CHAIN_ID_ARBITRUM => "ARBITRUM_HTTP_URL",
        CHAIN_ID_OPTIMISM => "OPTIMISM_HTTP_URL",
        CHAIN_ID_BASE => "BASE_HTTP_URL",
        _ => "",
    }
}

/// Get chain name
pub fn get_chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_ETHEREUM => "Ethereum",
        CHAIN_ID_POLYGON => "Polygon",
        CHAIN_ID_ARBITRUM => "Arbitrum One",
        CHAIN_ID_OPTIMISM => "Optimism",
        CHAIN_ID_BASE => "Base",
        _ => "Unknown",
    }
}

// ============================================
// SERVICE ENDPOINTS
// ============================================

/// Etherscan API v2 (multichain, `chainid` query parameter)
pub const DEFAULT_EXPLORER_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const DEFAULT_SOURCIFY_API_URL: &str = "https://sourcify.dev/server";
pub const DEFAULT_HONEYPOT_API_URL: &str = "https://api.honeypot.is";
pub const DEFAULT_GOPLUS_API_URL: &str = "https://api.gopluslabs.io";
pub const DEFAULT_DEXSCREENER_API_URL: &str = "https://api.dexscreener.com/latest/dex";

// ============================================
// WELL-KNOWN ADDRESSES
// ============================================

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dead";

/// EIP-1967 implementation slot: keccak256("eip1967.proxy.implementation") - 1
pub const EIP1967_IMPLEMENTATION_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

lazy_static! {
    /// Tokens considered safe regardless of computed risk (lower-case)
    static ref KNOWN_SAFE_TOKENS: HashSet<&'static str> = [
        // Ethereum
        "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", // USDC
        "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT
        "0x6b175474e89094c44da98b954eedeac495271d0f", // DAI
        "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", // WETH
        "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", // WBTC
        "0x514910771af9ca656af840dff83e8264ecf986ca", // LINK
        "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", // UNI
        "0x7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9", // AAVE
        "0x6c3ea9036406852006290770bedfcaba0e23a0e8", // PYUSD
        // Polygon
        "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359", // USDC
        "0xc2132d05d31c914a87c6611c10748aeb04b58e8f", // USDT
        "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270", // WMATIC
        // Arbitrum
        "0xaf88d065e77c8cc2239327c5edb3a432268e5831", // USDC
        "0x82af49447d8a07e3bd95bd0d56f35241523fbab1", // WETH
        "0x912ce59144191c1204e64559fe8253a0e49e6548", // ARB
        // Optimism
        "0x0b2c639c533813f4aa9d7837caf62653d097ff85", // USDC
        "0x4200000000000000000000000000000000000042", // OP
        // Optimism + Base
        "0x4200000000000000000000000000000000000006", // WETH
        // Base
        "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", // USDC
    ]
    .into_iter()
    .collect();

    /// Legitimate tokens whose issuer is expected to keep an EOA/admin in control
    static ref ISSUER_CONTROLLED_TOKENS: HashSet<&'static str> = [
        "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", // USDC (Circle)
        "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT (Tether)
        "0x6c3ea9036406852006290770bedfcaba0e23a0e8", // PYUSD (Paxos)
        "0x8e870d67f660d95d5be530380d0ec0bd388289e1", // USDP (Paxos)
        "0x0000000000085d4780b73119b644ae5ecd22b376", // TUSD
        "0x4fabb145d64652a948d72533023f6e7a623c7c53", // BUSD
        "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359", // USDC Polygon
        "0xc2132d05d31c914a87c6611c10748aeb04b58e8f", // USDT Polygon
        "0xaf88d065e77c8cc2239327c5edb3a432268e5831", // USDC Arbitrum
        "0x0b2c639c533813f4aa9d7837caf62653d097ff85", // USDC Optimism
        "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", // USDC Base
    ]
    .into_iter()
    .collect();

    /// Liquidity locker contracts (lower-case)
    static ref KNOWN_LOCKERS: HashSet<&'static str> = [
        "0x663a5c229c09b049e36dcc11a9b0d4a8eb9db214", // UNCX (Unicrypt) V2 locker
        "0xe2fe530c047f2d85298b07d9333c05737f1435fb", // Team Finance
        "0x71b5759d73262fbb223956913ecf4ecc51057641", // PinkLock
        "0xdba68f07d1b7ca219f78ae8582c213d975c25caf", // Team Finance V3
    ]
    .into_iter()
    .collect();
}

/// Keywords that mark a contract name/symbol as an obvious scam
pub const SCAM_KEYWORDS: [&str; 9] = [
    "honeypot", "scam", "rugpull", "rug pull", "ponzi", "phishing", "drainer", "fake", "test scam",
];

/// Keywords that identify stablecoins by name/symbol
pub const STABLECOIN_KEYWORDS: [&str; 6] = ["usd", "tether", "dai", "stablecoin", "eurc", "eurs"];

// ============================================
// LOOKUP FUNCTIONS
// ============================================

#[inline]
pub fn is_known_safe_token(address: &str) -> bool {
    KNOWN_SAFE_TOKENS.contains(address.to_lowercase().as_str())
}

#[inline]
pub fn is_issuer_controlled_token(address: &str) -> bool {
    ISSUER_CONTROLLED_TOKENS.contains(address.to_lowercase().as_str())
}

#[inline]
pub fn is_known_locker(address: &str) -> bool {
    KNOWN_LOCKERS.contains(address.to_lowercase().as_str())
}

/// Every known locker contract, for balance sweeps
pub fn known_lockers() -> impl Iterator<Item = &'static str> {
    KNOWN_LOCKERS.iter().copied()
}

/// Burn or zero address
#[inline]
pub fn is_burn_address(address: &str) -> bool {
    let lower = address.to_lowercase();
    lower == ZERO_ADDRESS || lower == BURN_ADDRESS
}

/// First scam keyword contained in any of the labels (case-insensitive)
pub fn find_scam_keyword<'a, I>(labels: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let lowered: Vec<String> = labels.into_iter().map(|l| l.to_lowercase()).collect();
    SCAM_KEYWORDS
        .iter()
        .copied()
        .find(|kw| lowered.iter().any(|label| label.contains(kw)))
}

/// True when any label looks like a stablecoin
pub fn matches_stablecoin<'a, I>(labels: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    labels.into_iter().any(|label| {
        let lower = label.to_lowercase();
        STABLECOIN_KEYWORDS.iter().any(|kw| lower.contains(kw))
    })
}
