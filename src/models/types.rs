//! Type definitions for Ruster Scan
//! All core data structures for contract risk analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::constants::{
    CHAIN_ID_ARBITRUM, CHAIN_ID_BASE, CHAIN_ID_ETHEREUM, CHAIN_ID_OPTIMISM, CHAIN_ID_POLYGON,
};

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
}

impl Chain {
    pub const ALL: [Chain; 5] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Base,
    ];

    /// Parse the request-level chain name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ethereum" => Some(Self::Ethereum),
            "polygon" => Some(Self::Polygon),
            "arbitrum" => Some(Self::Arbitrum),
            "optimism" => Some(Self::Optimism),
            "base" => Some(Self::Base),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Polygon => "polygon",
            Self::Arbitrum => "arbitrum",
            Self::Optimism => "optimism",
            Self::Base => "base",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => CHAIN_ID_ETHEREUM,
            Self::Polygon => CHAIN_ID_POLYGON,
            Self::Arbitrum => CHAIN_ID_ARBITRUM,
            Self::Optimism => CHAIN_ID_OPTIMISM,
            Self::Base => CHAIN_ID_BASE,
        }
    }

    /// Average block time in milliseconds, used for coarse age estimates
    pub fn block_time_ms(&self) -> u64 {
        match self {
            Self::Ethereum => 12_000,
            Self::Polygon => 2_000,
            Self::Arbitrum => 250,
            Self::Optimism => 2_000,
            Self::Base => 2_000,
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::Ethereum
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan depth requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanDepth {
    /// Cheap scan: source, ownership, behavior and oracle checks
    #[default]
    Quick,
    /// Adds liquidity, holder and creator-history checks
    Deep,
}

impl ScanDepth {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "quick" => Some(Self::Quick),
            "deep" => Some(Self::Deep),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Deep => "deep",
        }
    }

    pub fn is_deep(&self) -> bool {
        matches!(self, Self::Deep)
    }
}

impl fmt::Display for ScanDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline knows about the contract under analysis.
/// Built once by the resolver and shared read-only with every analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractInfo {
    /// Lower-cased `0x` address
    pub address: String,
    pub chain: Chain,
    pub verified: bool,
    pub source_code: Option<String>,
    pub creator: Option<String>,
    pub age_in_days: u64,
    pub transaction_count: u64,
    pub is_proxy: bool,
    pub implementation: Option<String>,
    pub fallback_mode: bool,
    pub has_bytecode: bool,
    /// Explorer label (e.g. "FiatTokenProxy")
    pub contract_name: Option<String>,
    /// ERC20 `name()`
    pub name: Option<String>,
    /// ERC20 `symbol()`
    pub symbol: Option<String>,
}

impl ContractInfo {
    pub fn new(address: &str, chain: Chain) -> Self {
        Self {
            address: address.to_lowercase(),
            chain,
            ..Default::default()
        }
    }

    /// Verified and the source text is actually available
    pub fn has_source(&self) -> bool {
        self.verified
            && self
                .source_code
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    /// Name and symbol joined for keyword matching
    pub fn display_labels(&self) -> Vec<&str> {
        [
            self.name.as_deref(),
            self.symbol.as_deref(),
            self.contract_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Finding severity. `Safe` marks positive signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// One step less severe, never below `Info`
    pub fn downgrade(self) -> Self {
        match self {
            Self::Critical => Self::High,
            Self::High => Self::Medium,
            Self::Medium => Self::Low,
            Self::Low | Self::Info => Self::Info,
            Self::Safe => Self::Safe,
        }
    }
}

/// Finding tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    // Aggregator
    ObviousScamName,
    ContractNotFound,
    NotInSecurityDatabases,
    LowActivity,
    FallbackMode,
    // Source patterns
    OwnerMint,
    Blacklist,
    TradingPause,
    AdjustableFees,
    TransactionLimits,
    BalanceManipulation,
    SelfDestruct,
    DelegateCall,
    TxOriginAuth,
    HiddenOwner,
    AntiBotTrap,
    RenouncedOwnership,
    // Ownership
    OwnershipCentralized,
    IssuerControlled,
    OwnerIsContract,
    NoOwnerFunction,
    // Liquidity
    LiquidityLocked,
    LiquidityUnlocked,
    RugCapable,
    NoLiquidity,
    LowLiquidity,
    // Behavior and holders
    FailedTransactions,
    PrivilegedActivity,
    NewContract,
    DormantContract,
    HolderConcentration,
    HoldersDistributed,
    // Bytecode
    BytecodeSelector,
    BytecodeOpcode,
    NoBytecode,
    // Oracles
    SourceVerified,
    SourceUnverified,
    DecentralizedVerified,
    HoneypotDetected,
    HighTax,
    HoneypotClear,
    ScamDatabaseFlag,
    ScamDatabaseClear,
    SerialDeployer,
    AbandonedContracts,
    RapidDeployment,
    HighAbandonmentRate,
    CreatorClean,
    // Degraded checks
    OracleRateLimited,
    OracleUnavailable,
    OracleNotFound,
    AnalyzerUnavailable,
}

/// A single observation produced by exactly one analyzer or oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evidence: Option<serde_json::Value>,
    pub score_delta: i32,
    pub source: String,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        description: impl Into<String>,
        score_delta: i32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            evidence: None,
            score_delta,
            source: source.into(),
        }
    }

    /// Zero-score informational finding
    pub fn info(kind: FindingKind, description: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, description, 0, source)
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Contribution of one analyzer or oracle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub score_delta: i32,
    pub findings: Vec<Finding>,
}

impl AnalyzerResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero contribution explaining why a check could not produce data
    pub fn unavailable(kind: FindingKind, description: impl Into<String>, source: &str) -> Self {
        Self {
            score_delta: 0,
            findings: vec![Finding::info(kind, description, source)],
        }
    }

    /// Append a finding and add its delta
    pub fn push(&mut self, finding: Finding) {
        self.score_delta += finding.score_delta;
        self.findings.push(finding);
    }

    pub fn with(mut self, finding: Finding) -> Self {
        self.push(finding);
        self
    }

    pub fn extend(&mut self, other: AnalyzerResult) {
        self.score_delta += other.score_delta;
        self.findings.extend(other.findings);
    }
}

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Pure threshold function of the final score
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Self::Critical,
            60..=79 => Self::High,
            40..=59 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Final, cacheable result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub address: String,
    pub chain: Chain,
    pub scan_depth: ScanDepth,
    pub score: u8,
    pub level: RiskLevel,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contract_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_symbol: Option<String>,
    pub using_fallback: bool,
    pub resolution_trace: Vec<String>,
    pub findings: Vec<Finding>,
    pub security_checks: BTreeMap<String, bool>,
    pub recommendations: Vec<String>,
    pub analyzed_at: String,
}
