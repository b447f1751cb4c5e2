//! Holder concentration
//!
//! Top holders come from the explorer. Burn, zero, locker and pool addresses
//! are excluded before measuring: tokens parked there are not someone's bag.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::contract::{read_total_supply, share_percent};
use crate::providers::dexscreener::PairSource;
use crate::providers::explorer::ExplorerApi;
use crate::providers::rpc::ChainReader;
use crate::utils::constants::{is_burn_address, is_known_locker, HOLDER_SAMPLE};

const NAME: &str = "holders";

const LARGEST_HOLDER_MAX_PERCENT: f64 = 50.0;
const TOP_HOLDERS_MAX_PERCENT: f64 = 80.0;

pub struct HolderAnalyzer {
    explorer: Arc<dyn ExplorerApi>,
    pairs: Arc<dyn PairSource>,
    reader: Arc<dyn ChainReader>,
}

impl HolderAnalyzer {
    pub fn new(explorer: Arc<dyn ExplorerApi>, pairs: Arc<dyn PairSource>, reader: Arc<dyn ChainReader>) -> Self {
        Self { explorer, pairs, reader }
    }

    async fn pool_addresses(&self, info: &ContractInfo) -> HashSet<String> {
        match self.pairs.pairs_for_chain(info.chain, &info.address).await {
            Ok(pairs) => pairs.into_iter().map(|p| p.pair_address.to_lowercase()).collect(),
            Err(e) => {
                warn!(error = %e, "⚠️ Pool lookup failed, pools stay in the holder list");
                HashSet::new()
            }
        }
    }
}

#[async_trait]
impl Analyzer for HolderAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Behavior
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        ctx.depth.is_deep()
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        // Over-fetch so exclusions still leave a full top list
        let holders = self
            .explorer
            .token_holders(info.chain, &info.address, HOLDER_SAMPLE * 2)
            .await?;
        if holders.is_empty() {
            return Err(AppError::not_found("explorer returned no token holders"));
        }

        let supply = read_total_supply(self.reader.as_ref(), info.chain, &info.address).await?;
        if supply.is_zero() {
            return Err(AppError::invalid_response("token reports zero total supply"));
        }

        let pools = self.pool_addresses(info).await;
        let shares: Vec<(String, f64)> = holders
            .into_iter()
            .filter(|h| {
                let address = h.address.to_lowercase();
                !is_burn_address(&address) && !is_known_locker(&address) && !pools.contains(&address)
            })
            .take(HOLDER_SAMPLE)
            .map(|h| {
                let quantity = U256::from_str_radix(h.quantity.trim(), 10).unwrap_or(U256::ZERO);
                (h.address.to_lowercase(), share_percent(quantity, supply))
            })
            .collect();

        let largest = shares.iter().map(|(_, p)| *p).fold(0.0, f64::max);
        let top_total: f64 = shares.iter().map(|(_, p)| p).sum();
        debug!(token = %info.address, largest, top_total, "Holder distribution");

        let evidence = serde_json::json!({
            "largest_percent": largest,
            "top_holders_percent": top_total,
            "holders_counted": shares.len(),
        });

        let finding = if largest > LARGEST_HOLDER_MAX_PERCENT {
            Finding::new(
                FindingKind::HolderConcentration,
                Severity::High,
                format!("A single wallet holds {:.1}% of the supply", largest),
                20,
                NAME,
            )
        } else if top_total > TOP_HOLDERS_MAX_PERCENT {
            Finding::new(
                FindingKind::HolderConcentration,
                Severity::Medium,
                format!("Top {} wallets hold {:.1}% of the supply", shares.len(), top_total),
                10,
                NAME,
            )
        } else {
            Finding::new(
                FindingKind::HoldersDistributed,
                Severity::Safe,
                "Supply is spread across holders",
                -5,
                NAME,
            )
        };
        Ok(AnalyzerResult::new().with(finding.with_evidence(evidence)))
    }
}
