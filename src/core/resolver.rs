//! Data Source Resolver
//!
//! Describes a contract from the best source that answers:
//!
//! ```text
//! TryPrimary ──(explorer unavailable)──▶ TryDecentralizedVerification ──(nothing)──▶ FallbackChainRead
//!     │                                        │                                         │
//!  Verified / Unverified                    Verified                               Unverified (fallback)
//! ```
//!
//! Transitions only move forward, so no stage runs twice. Every visited stage
//! leaves one line in the trace. A failure inside `FallbackChainRead` is the
//! only fatal outcome.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, ContractInfo};
use crate::providers::contract::{read_implementation, read_name, read_symbol};
use crate::providers::explorer::{ExplorerApi, SortOrder};
use crate::providers::rpc::{BlockTag, ChainReader};
use crate::providers::sourcify::SourcifyApi;
use crate::utils::cache::Clock;
use crate::utils::constants::BEHAVIOR_TX_SAMPLE;

const DAY_SECS: u64 = 86_400;

/// Binary-search probes for the deployment block; 40 covers any chain height
const MAX_AGE_PROBES: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TryPrimary,
    TryDecentralizedVerification,
    FallbackChainRead,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TryPrimary => "try_primary",
            Self::TryDecentralizedVerification => "try_decentralized_verification",
            Self::FallbackChainRead => "fallback_chain_read",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Verified,
    Unverified,
}

/// What a stage decided
enum Transition {
    Finish(Outcome, String),
    Advance(Stage, String),
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub info: ContractInfo,
    pub outcome: Outcome,
    pub using_fallback: bool,
    /// `stage: reason` per visited stage, in order
    pub trace: Vec<String>,
}

pub struct Resolver {
    explorer: Arc<dyn ExplorerApi>,
    sourcify: Arc<dyn SourcifyApi>,
    reader: Arc<dyn ChainReader>,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub fn new(
        explorer: Arc<dyn ExplorerApi>,
        sourcify: Arc<dyn SourcifyApi>,
        reader: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            explorer,
            sourcify,
            reader,
            clock,
        }
    }

    pub async fn resolve(&self, address: &str, chain: Chain) -> AppResult<Resolution> {
        let mut info = ContractInfo::new(address, chain);
        let mut trace = Vec::new();
        let mut stage = Stage::TryPrimary;

        let outcome = loop {
            let transition = match stage {
                Stage::TryPrimary => self.try_primary(&mut info).await,
                Stage::TryDecentralizedVerification => self.try_decentralized(&mut info).await,
                Stage::FallbackChainRead => match self.fallback_chain_read(&mut info).await {
                    Ok(transition) => transition,
                    Err(e) => {
                        trace.push(format!("{}: {}", stage, e));
                        warn!(address = %info.address, trace = ?trace, "❌ Resolution failed");
                        return Err(AppError::resolution_failure(format!(
                            "no data source could describe {} on {}: {}",
                            info.address, chain, e.message
                        )));
                    }
                },
            };

            match transition {
                Transition::Finish(outcome, reason) => {
                    trace.push(format!("{}: {}", stage, reason));
                    break outcome;
                }
                Transition::Advance(next, reason) => {
                    debug!(address = %info.address, from = %stage, to = %next, %reason, "Resolver transition");
                    trace.push(format!("{}: {}", stage, reason));
                    stage = next;
                }
            }
        };

        self.read_chain_metadata(&mut info).await;
        let using_fallback = stage == Stage::FallbackChainRead;
        info.fallback_mode = using_fallback;

        info!(
            "🧭 Resolved {} on {} via {} (verified={}, fallback={})",
            info.address, chain, stage, info.verified, using_fallback
        );

        Ok(Resolution {
            info,
            outcome,
            using_fallback,
            trace,
        })
    }

    async fn try_primary(&self, info: &mut ContractInfo) -> Transition {
        match self.explorer.source_code(info.chain, &info.address).await {
            Ok(Some(source)) => {
                info.verified = true;
                info.has_bytecode = true;
                info.source_code = Some(source.source_code);
                info.contract_name = source.contract_name;
                info.is_proxy = source.is_proxy;
                info.implementation = source.implementation;
                self.explorer_metadata(info).await;
                Transition::Finish(Outcome::Verified, "verified source from explorer".to_string())
            }
            Ok(None) => {
                self.explorer_metadata(info).await;
                Transition::Finish(Outcome::Unverified, "explorer reports no verified source".to_string())
            }
            Err(e) => {
                warn!(address = %info.address, error = %e, "⚠️ Explorer unavailable, trying Sourcify");
                Transition::Advance(
                    Stage::TryDecentralizedVerification,
                    format!("explorer unavailable ({})", e.code_str()),
                )
            }
        }
    }

    async fn try_decentralized(&self, info: &mut ContractInfo) -> Transition {
        match self.sourcify.source_files(info.chain, &info.address).await {
            Ok(Some(source)) => {
                info.verified = true;
                info.has_bytecode = true;
                info.source_code = Some(source.source_code);
                info.contract_name = source.contract_name;
                self.chain_activity(info).await;
                Transition::Finish(Outcome::Verified, "verified source from Sourcify".to_string())
            }
            Ok(None) => Transition::Advance(Stage::FallbackChainRead, "not verified on Sourcify".to_string()),
            Err(e) => Transition::Advance(
                Stage::FallbackChainRead,
                format!("Sourcify unavailable ({})", e.code_str()),
            ),
        }
    }

    async fn fallback_chain_read(&self, info: &mut ContractInfo) -> AppResult<Transition> {
        let code = self
            .reader
            .get_code(info.chain, &info.address, BlockTag::Latest)
            .await?;
        info.has_bytecode = !code.is_empty();
        self.chain_activity(info).await;

        let reason = if info.has_bytecode {
            "minimal info from chain reads"
        } else {
            "no bytecode at address"
        };
        Ok(Transition::Finish(Outcome::Unverified, reason.to_string()))
    }

    /// Creator, age and activity from the explorer; failures leave defaults
    async fn explorer_metadata(&self, info: &mut ContractInfo) {
        match self.explorer.contract_creation(info.chain, &info.address).await {
            Ok(Some(creation)) => {
                if let Some(ts) = creation.timestamp {
                    info.age_in_days = self.clock.now_secs().saturating_sub(ts) / DAY_SECS;
                }
                info.creator = Some(creation.creator.to_lowercase());
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Creation lookup failed"),
        }

        match self
            .explorer
            .transactions(info.chain, &info.address, BEHAVIOR_TX_SAMPLE, SortOrder::Desc)
            .await
        {
            Ok(txs) => info.transaction_count = txs.len() as u64,
            Err(e) => debug!(error = %e, "Transaction count lookup failed"),
        }

        if !info.has_bytecode {
            info.has_bytecode = matches!(
                self.reader.get_code(info.chain, &info.address, BlockTag::Latest).await,
                Ok(code) if !code.is_empty()
            );
        }
    }

    /// Nonce-derived activity and a coarse age estimate; failures leave defaults
    async fn chain_activity(&self, info: &mut ContractInfo) {
        match self.reader.get_transaction_count(info.chain, &info.address).await {
            Ok(nonce) => info.transaction_count = nonce,
            Err(e) => debug!(error = %e, "Nonce lookup failed"),
        }
        if info.has_bytecode {
            info.age_in_days = self.estimate_age_days(info.chain, &info.address).await;
        }
    }

    async fn estimate_age_days(&self, chain: Chain, address: &str) -> u64 {
        match self.find_deploy_block(chain, address).await {
            Ok((head, deployed)) => {
                let elapsed_ms = head.saturating_sub(deployed).saturating_mul(chain.block_time_ms());
                elapsed_ms / 1000 / DAY_SECS
            }
            Err(e) => {
                // Non-archive nodes cannot answer historical getCode
                debug!(error = %e, "Age estimate unavailable");
                0
            }
        }
    }

    /// First block holding code. Code must exist at head.
    async fn find_deploy_block(&self, chain: Chain, address: &str) -> AppResult<(u64, u64)> {
        let head = self.reader.block_number(chain).await?;
        let (mut lo, mut hi) = (0u64, head);
        for _ in 0..MAX_AGE_PROBES {
            if lo >= hi {
                break;
            }
            let mid = lo + (hi - lo) / 2;
            let code = self.reader.get_code(chain, address, BlockTag::Number(mid)).await?;
            if code.is_empty() {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok((head, hi))
    }

    /// Token metadata and proxy slot, whichever stage finished
    async fn read_chain_metadata(&self, info: &mut ContractInfo) {
        if !info.has_bytecode {
            return;
        }
        let reader = self.reader.as_ref();
        info.name = read_name(reader, info.chain, &info.address).await.unwrap_or_default();
        info.symbol = read_symbol(reader, info.chain, &info.address).await.unwrap_or_default();

        // Explorer proxy fields win when present
        if !info.is_proxy {
            if let Ok(Some(implementation)) = read_implementation(reader, info.chain, &info.address).await {
                info.is_proxy = true;
                info.implementation = Some(implementation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::AppResult;
    use crate::providers::explorer::{ContractCreation, ExplorerSource, ExplorerTx, TokenHolder};
    use crate::providers::sourcify::{SourcifyMatch, SourcifySource};
    use crate::utils::cache::ManualClock;
    use async_trait::async_trait;

    const ADDRESS: &str = "0x1111111111111111111111111111111111111111";
    const NOW: u64 = 1_700_000_000;

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Verified,
        Unverified,
        Down,
    }

    struct Explorer(Mode);

    #[async_trait]
    impl ExplorerApi for Explorer {
        async fn source_code(&self, _: Chain, _: &str) -> AppResult<Option<ExplorerSource>> {
            match self.0 {
                Mode::Verified => Ok(Some(ExplorerSource {
                    source_code: "contract Token {}".to_string(),
                    contract_name: Some("Token".to_string()),
                    is_proxy: false,
                    implementation: None,
                })),
                Mode::Unverified => Ok(None),
                Mode::Down => Err(AppError::upstream("connection refused")),
            }
        }
        async fn contract_creation(&self, _: Chain, _: &str) -> AppResult<Option<ContractCreation>> {
            Ok(Some(ContractCreation {
                creator: "0xDEPLOYER".to_string(),
                tx_hash: "0xhash".to_string(),
                timestamp: Some(NOW - 40 * DAY_SECS),
            }))
        }
        async fn transactions(&self, _: Chain, _: &str, _: usize, _: SortOrder) -> AppResult<Vec<ExplorerTx>> {
            Ok(vec![
                ExplorerTx {
                    hash: "0x1".to_string(),
                    from: "0xa".to_string(),
                    to: ADDRESS.to_string(),
                    timestamp: NOW,
                    is_error: false,
                    function_name: String::new(),
                    contract_address: String::new(),
                };
                3
            ])
        }
        async fn token_holders(&self, _: Chain, _: &str, _: usize) -> AppResult<Vec<TokenHolder>> {
            Ok(vec![])
        }
    }

    struct Sourcify(Mode);

    #[async_trait]
    impl SourcifyApi for Sourcify {
        async fn check_match(&self, _: Chain, _: &str) -> AppResult<SourcifyMatch> {
            Ok(SourcifyMatch::Missing)
        }
        async fn source_files(&self, _: Chain, _: &str) -> AppResult<Option<SourcifySource>> {
            match self.0 {
                Mode::Verified => Ok(Some(SourcifySource {
                    source_code: "contract Token {}".to_string(),
                    contract_name: Some("Token".to_string()),
                    level: SourcifyMatch::Full,
                })),
                Mode::Unverified => Ok(None),
                Mode::Down => Err(AppError::upstream_timeout("sourcify")),
            }
        }
    }

    /// Code appears at `deployed_at`; head is block 1_000_000
    struct Node {
        deployed_at: Option<u64>,
        archive: bool,
        up: bool,
    }

    #[async_trait]
    impl ChainReader for Node {
        async fn get_code(&self, _: Chain, _: &str, block: BlockTag) -> AppResult<Vec<u8>> {
            if !self.up {
                return Err(AppError::upstream("rpc down"));
            }
            let Some(deployed_at) = self.deployed_at else {
                return Ok(vec![]);
            };
            match block {
                BlockTag::Latest => Ok(vec![0x60, 0x80]),
                BlockTag::Number(_) if !self.archive => Err(AppError::upstream("missing trie node")),
                BlockTag::Number(n) if n >= deployed_at => Ok(vec![0x60, 0x80]),
                BlockTag::Number(_) => Ok(vec![]),
            }
        }
        async fn get_transaction_count(&self, _: Chain, _: &str) -> AppResult<u64> {
            Ok(1)
        }
        async fn block_number(&self, _: Chain) -> AppResult<u64> {
            Ok(1_000_000)
        }
        async fn get_storage_at(&self, _: Chain, _: &str, _: &str) -> AppResult<Vec<u8>> {
            Ok(vec![0u8; 32])
        }
        async fn call(&self, _: Chain, _: &str, _: &[u8]) -> AppResult<Vec<u8>> {
            Err(AppError::not_found("execution reverted"))
        }
    }

    fn resolver(explorer: Mode, sourcify: Mode, node: Node) -> Resolver {
        Resolver::new(
            Arc::new(Explorer(explorer)),
            Arc::new(Sourcify(sourcify)),
            Arc::new(node),
            Arc::new(ManualClock::new(NOW)),
        )
    }

    fn archive() -> Node {
        Node {
            deployed_at: Some(1_000_000 - 7_200 * 10),
            archive: true,
            up: true,
        }
    }

    #[tokio::test]
    async fn test_primary_verified() {
        let resolution = resolver(Mode::Verified, Mode::Down, archive())
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(resolution.outcome, Outcome::Verified);
        assert!(!resolution.using_fallback);
        assert_eq!(resolution.trace.len(), 1);
        assert!(resolution.trace[0].starts_with("try_primary"));
        assert_eq!(resolution.info.creator.as_deref(), Some("0xdeployer"));
        assert_eq!(resolution.info.age_in_days, 40);
        assert_eq!(resolution.info.transaction_count, 3);
    }

    #[tokio::test]
    async fn test_unverified_does_not_fall_through() {
        let resolution = resolver(Mode::Unverified, Mode::Verified, archive())
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(resolution.outcome, Outcome::Unverified);
        assert!(!resolution.info.verified);
        assert_eq!(resolution.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_explorer_down_uses_sourcify() {
        let resolution = resolver(Mode::Down, Mode::Verified, archive())
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(resolution.outcome, Outcome::Verified);
        assert!(!resolution.using_fallback);
        assert!(resolution.info.has_source());
        assert_eq!(resolution.trace.len(), 2);
        assert!(resolution.trace[1].starts_with("try_decentralized_verification"));
        // 72_000 blocks at 12s
        assert_eq!(resolution.info.age_in_days, 10);
    }

    #[tokio::test]
    async fn test_fallback_chain_read() {
        let resolution = resolver(Mode::Down, Mode::Unverified, archive())
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(resolution.outcome, Outcome::Unverified);
        assert!(resolution.using_fallback);
        assert!(resolution.info.fallback_mode);
        assert!(resolution.info.has_bytecode);
        assert_eq!(resolution.info.transaction_count, 1);
        let stages: Vec<&str> = resolution
            .trace
            .iter()
            .map(|t| t.split(':').next().unwrap())
            .collect();
        assert_eq!(
            stages,
            vec!["try_primary", "try_decentralized_verification", "fallback_chain_read"]
        );
    }

    #[tokio::test]
    async fn test_non_archive_node_gives_zero_age() {
        let node = Node {
            archive: false,
            ..archive()
        };
        let resolution = resolver(Mode::Down, Mode::Down, node)
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap();
        assert_eq!(resolution.info.age_in_days, 0);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_fatal() {
        let node = Node {
            up: false,
            ..archive()
        };
        let err = resolver(Mode::Down, Mode::Down, node)
            .resolve(ADDRESS, Chain::Ethereum)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::models::errors::ErrorCode::ResolutionFailure);
    }
}
