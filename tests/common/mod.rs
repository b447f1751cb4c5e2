//! In-process upstreams shared by the integration tests

#![allow(dead_code)]

use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ruster_scan::models::types::{AnalyzerResult, Chain, ContractInfo, Finding, FindingKind};
use ruster_scan::oracles::{OracleAdapter, SecurityOracle, Verdict};
use ruster_scan::providers::contract::{nameCall, ownerCall, parse_address, symbolCall};
use ruster_scan::providers::dexscreener::{DexPair, PairSource};
use ruster_scan::providers::explorer::{
    ContractCreation, ExplorerApi, ExplorerSource, ExplorerTx, SortOrder, TokenHolder,
};
use ruster_scan::providers::rpc::{BlockTag, ChainReader};
use ruster_scan::providers::sourcify::{SourcifyApi, SourcifyMatch, SourcifySource};
use ruster_scan::utils::cache::{ManualClock, ResultCache};
use ruster_scan::{AppError, AppResult, Collaborators, Scanner};

pub const NOW: u64 = 1_700_000_000;
pub const DAY: u64 = 86_400;
pub const TTL: u64 = 3_600;

pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const CREATOR: &str = "0x9999999999999999999999999999999999999999";
pub const EOA: &str = "0x2222222222222222222222222222222222222222";

pub const PLAIN_SOURCE: &str = r#"
pragma solidity ^0.8.0;
contract Plain {
    mapping(address => uint256) private balances;
    function transfer(address to, uint256 amount) public returns (bool) {
        balances[msg.sender] -= amount;
        balances[to] += amount;
        return true;
    }
}
"#;

/// What the mocked upstreams know about one contract
#[derive(Debug, Clone)]
pub struct Profile {
    pub address: String,
    pub source: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub created_days_ago: Option<u64>,
    pub tx_count: usize,
    /// The first this-many sampled transactions reverted
    pub failed_txs: usize,
    pub bytecode: Vec<u8>,
    pub owner: Option<String>,
    /// `owner()` answers only after this long
    pub owner_delay: Option<Duration>,
    pub explorer_down: bool,
}

impl Profile {
    /// Verified, 400 days old, 50 successful transfers, no owner function
    pub fn plain(address: &str) -> Self {
        Self {
            address: address.to_string(),
            source: Some(PLAIN_SOURCE.to_string()),
            name: Some("Plain Token".to_string()),
            symbol: Some("PLN".to_string()),
            created_days_ago: Some(400),
            tx_count: 50,
            failed_txs: 0,
            bytecode: vec![0x60, 0x80, 0x60, 0x40, 0x52],
            owner: None,
            owner_delay: None,
            explorer_down: false,
        }
    }

    pub fn unknown(address: &str) -> Self {
        Self {
            source: None,
            name: None,
            symbol: None,
            created_days_ago: None,
            tx_count: 0,
            ..Self::plain(address)
        }
    }

    fn is_target(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

pub struct MockExplorer {
    profile: Profile,
    /// `getsourcecode` lookups served
    pub source_calls: AtomicUsize,
}

impl MockExplorer {
    pub fn calls(&self) -> usize {
        self.source_calls.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> AppResult<()> {
        if self.profile.explorer_down {
            return Err(AppError::upstream("explorer HTTP error: 502 Bad Gateway"));
        }
        Ok(())
    }
}

#[async_trait]
impl ExplorerApi for MockExplorer {
    async fn source_code(&self, _: Chain, _: &str) -> AppResult<Option<ExplorerSource>> {
        self.source_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        Ok(self.profile.source.clone().map(|source_code| ExplorerSource {
            source_code,
            contract_name: Some("Plain".to_string()),
            is_proxy: false,
            implementation: None,
        }))
    }

    async fn contract_creation(&self, _: Chain, _: &str) -> AppResult<Option<ContractCreation>> {
        self.check_up()?;
        Ok(self.profile.created_days_ago.map(|days| ContractCreation {
            creator: CREATOR.to_string(),
            tx_hash: "0xcreation".to_string(),
            timestamp: Some(NOW - days * DAY),
        }))
    }

    async fn transactions(
        &self,
        _: Chain,
        address: &str,
        limit: usize,
        _: SortOrder,
    ) -> AppResult<Vec<ExplorerTx>> {
        self.check_up()?;
        if !self.profile.is_target(address) {
            return Ok(vec![]);
        }
        Ok((0..self.profile.tx_count.min(limit))
            .map(|i| ExplorerTx {
                hash: format!("0x{:064x}", i),
                from: EOA.to_string(),
                to: self.profile.address.to_lowercase(),
                timestamp: NOW - 3_600 - i as u64,
                is_error: i < self.profile.failed_txs,
                function_name: "transfer(address to, uint256 amount)".to_string(),
                contract_address: String::new(),
            })
            .collect())
    }

    async fn token_holders(&self, _: Chain, _: &str, _: usize) -> AppResult<Vec<TokenHolder>> {
        Ok(vec![])
    }
}

/// Sourcify that never has the contract
pub struct EmptySourcify;

#[async_trait]
impl SourcifyApi for EmptySourcify {
    async fn check_match(&self, _: Chain, _: &str) -> AppResult<SourcifyMatch> {
        Ok(SourcifyMatch::Missing)
    }

    async fn source_files(&self, _: Chain, _: &str) -> AppResult<Option<SourcifySource>> {
        Ok(None)
    }
}

/// Archive node where the target has code since genesis
pub struct MockChain {
    profile: Profile,
}

fn revert() -> AppError {
    AppError::not_found("execution reverted")
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_code(&self, _: Chain, address: &str, _: BlockTag) -> AppResult<Vec<u8>> {
        if self.profile.is_target(address) {
            Ok(self.profile.bytecode.clone())
        } else {
            Ok(vec![])
        }
    }

    async fn get_transaction_count(&self, _: Chain, _: &str) -> AppResult<u64> {
        Ok(self.profile.tx_count as u64)
    }

    async fn block_number(&self, _: Chain) -> AppResult<u64> {
        Ok(19_000_000)
    }

    async fn get_storage_at(&self, _: Chain, _: &str, _: &str) -> AppResult<Vec<u8>> {
        Ok(vec![0u8; 32])
    }

    async fn call(&self, _: Chain, to: &str, data: &[u8]) -> AppResult<Vec<u8>> {
        if !self.profile.is_target(to) || data.len() < 4 {
            return Err(revert());
        }
        let selector = &data[..4];

        if selector == nameCall::SELECTOR {
            return self.profile.name.clone().map(|n| (n,).abi_encode_params()).ok_or_else(revert);
        }
        if selector == symbolCall::SELECTOR {
            return self.profile.symbol.clone().map(|s| (s,).abi_encode_params()).ok_or_else(revert);
        }
        if selector == ownerCall::SELECTOR {
            if let Some(delay) = self.profile.owner_delay {
                tokio::time::sleep(delay).await;
            }
            let owner = self.profile.owner.as_deref().ok_or_else(revert)?;
            return Ok((parse_address(owner)?,).abi_encode_params());
        }
        Err(revert())
    }
}

pub struct NoPairs;

#[async_trait]
impl PairSource for NoPairs {
    async fn pairs_for_chain(&self, _: Chain, _: &str) -> AppResult<Vec<DexPair>> {
        Ok(vec![])
    }
}

/// Scam database that always knows the contract and finds nothing
pub struct CleanDatabase;

#[async_trait]
impl SecurityOracle for CleanDatabase {
    type Raw = ();

    fn name(&self) -> &'static str {
        "clean_db"
    }

    fn is_security_database(&self) -> bool {
        true
    }

    async fn check(&self, _: &str, _: Chain) -> Verdict<()> {
        Verdict::Checked(())
    }

    fn risk(&self, _: &(), _: &ContractInfo) -> AnalyzerResult {
        AnalyzerResult::new().with(Finding::info(
            FindingKind::ScamDatabaseClear,
            "No flags in the database",
            "clean_db",
        ))
    }
}

pub struct Harness {
    pub scanner: Arc<Scanner>,
    pub clock: Arc<ManualClock>,
    pub explorer: Arc<MockExplorer>,
}

pub fn harness(profile: Profile) -> Harness {
    harness_with_timeout(profile, Duration::from_secs(5))
}

pub fn harness_with_timeout(profile: Profile, analyzer_timeout: Duration) -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let explorer = Arc::new(MockExplorer {
        profile: profile.clone(),
        source_calls: AtomicUsize::new(0),
    });

    let databases: Vec<Arc<dyn OracleAdapter>> = vec![Arc::new(CleanDatabase)];
    let parts = Collaborators {
        explorer: explorer.clone(),
        sourcify: Arc::new(EmptySourcify),
        reader: Arc::new(MockChain { profile }),
        pairs: Arc::new(NoPairs),
        clock: clock.clone(),
        databases,
    };
    let cache = Arc::new(ResultCache::with_clock(TTL, clock.clone()));

    Harness {
        scanner: Arc::new(Scanner::new(parts, cache, analyzer_timeout, 10)),
        clock,
        explorer,
    }
}
