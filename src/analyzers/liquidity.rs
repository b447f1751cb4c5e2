//! Liquidity lock analysis
//!
//! The best pool comes from DexScreener; the lock itself is measured on-chain
//! from the pair's LP token: LP held by the burn address, the zero address or
//! a known locker contract counts as locked.

use alloy_primitives::U256;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::info;

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::contract::{read_balance_of, read_total_supply, share_percent};
use crate::providers::dexscreener::PairSource;
use crate::providers::rpc::ChainReader;
use crate::utils::constants::{known_lockers, BURN_ADDRESS, ZERO_ADDRESS};

const NAME: &str = "liquidity";

const LOCKED_MIN_PERCENT: f64 = 80.0;
const RUG_CAPABLE_MIN_PERCENT: f64 = 50.0;
const LOW_LIQUIDITY_USD: f64 = 10_000.0;

pub struct LiquidityAnalyzer {
    pairs: Arc<dyn PairSource>,
    reader: Arc<dyn ChainReader>,
}

impl LiquidityAnalyzer {
    pub fn new(pairs: Arc<dyn PairSource>, reader: Arc<dyn ChainReader>) -> Self {
        Self { pairs, reader }
    }

    /// LP held by burn, zero and locker addresses
    async fn locked_balance(&self, info: &ContractInfo, lp_token: &str) -> AppResult<U256> {
        let holders: Vec<&str> = [BURN_ADDRESS, ZERO_ADDRESS]
            .into_iter()
            .chain(known_lockers())
            .collect();
        let reads = holders
            .iter()
            .map(|holder| read_balance_of(self.reader.as_ref(), info.chain, lp_token, holder));
        let balances = try_join_all(reads).await?;
        Ok(balances
            .into_iter()
            .fold(U256::ZERO, |acc, b| acc.saturating_add(b)))
    }
}

#[async_trait]
impl Analyzer for LiquidityAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Liquidity
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        ctx.depth.is_deep()
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        let mut result = AnalyzerResult::new();

        let Some(pair) = self.pairs.best_pair(info.chain, &info.address).await? else {
            result.push(Finding::new(
                FindingKind::NoLiquidity,
                Severity::Medium,
                "No trading pool found for this token",
                15,
                NAME,
            ));
            return Ok(result);
        };

        let liquidity_usd = pair.liquidity_usd();
        info!(
            "💧 Best pool for {}: {} on {} (${:.0})",
            info.address, pair.pair_address, pair.dex_id, liquidity_usd
        );

        if liquidity_usd < LOW_LIQUIDITY_USD {
            result.push(
                Finding::new(
                    FindingKind::LowLiquidity,
                    Severity::Low,
                    format!("Pool liquidity is only ${:.0}", liquidity_usd),
                    5,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "pair": pair.pair_address, "liquidity_usd": liquidity_usd })),
            );
        }

        if !pair.is_v2_compatible() {
            result.push(Finding::info(
                FindingKind::AnalyzerUnavailable,
                format!("LP lock not measurable for {} concentrated-liquidity pool", pair.dex_id),
                NAME,
            ));
            return Ok(result);
        }

        let lp_token = pair.pair_address.to_lowercase();
        let supply = read_total_supply(self.reader.as_ref(), info.chain, &lp_token).await?;
        if supply.is_zero() {
            result.push(Finding::info(
                FindingKind::AnalyzerUnavailable,
                "LP token reports zero supply",
                NAME,
            ));
            return Ok(result);
        }

        let locked_percent = share_percent(self.locked_balance(info, &lp_token).await?, supply);
        let creator_percent = match info.creator.as_deref() {
            Some(creator) => share_percent(
                read_balance_of(self.reader.as_ref(), info.chain, &lp_token, creator).await?,
                supply,
            ),
            None => 0.0,
        };
        let evidence = serde_json::json!({
            "pair": lp_token,
            "locked_percent": locked_percent,
            "creator_percent": creator_percent,
        });

        let finding = if locked_percent >= LOCKED_MIN_PERCENT {
            Finding::new(
                FindingKind::LiquidityLocked,
                Severity::Safe,
                format!("{:.1}% of LP tokens are burned or locked", locked_percent),
                -15,
                NAME,
            )
        } else if creator_percent > RUG_CAPABLE_MIN_PERCENT {
            Finding::new(
                FindingKind::RugCapable,
                Severity::Critical,
                format!("Deployer holds {:.1}% of LP tokens and can pull liquidity", creator_percent),
                35,
                NAME,
            )
        } else {
            Finding::new(
                FindingKind::LiquidityUnlocked,
                Severity::High,
                format!("Only {:.1}% of LP tokens are locked", locked_percent),
                20,
                NAME,
            )
        };
        result.push(finding.with_evidence(evidence));
        Ok(result)
    }
}
