//! Behavioral history over the latest explorer transactions
//!
//! - failed-transaction ratio (needs at least 10 transactions to mean anything)
//! - privileged calls by the deployer (fee, tax, blacklist, bot, limit, trading toggles)
//! - very new contract
//! - dormant contract

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::explorer::{ExplorerApi, ExplorerTx, SortOrder};
use crate::utils::cache::Clock;
use crate::utils::constants::BEHAVIOR_TX_SAMPLE;

const NAME: &str = "behavior";

const DAY_SECS: u64 = 86_400;
const DORMANT_AFTER_DAYS: u64 = 30;
const MIN_TXS_FOR_FAILURE_RATIO: usize = 10;

lazy_static! {
    static ref PRIVILEGED_CALL: Regex =
        Regex::new(r"(?i)^\s*\w*(fee|tax|blacklist|blocklist|bot|maxtx|maxwallet|limit|trading|pause)\w*\s*\(")
            .expect("privileged call regex");
}

/// Function name without its parameter list
fn function_label(tx: &ExplorerTx) -> &str {
    tx.function_name.split('(').next().unwrap_or_default().trim()
}

pub struct BehaviorAnalyzer {
    explorer: Arc<dyn ExplorerApi>,
    clock: Arc<dyn Clock>,
}

impl BehaviorAnalyzer {
    pub fn new(explorer: Arc<dyn ExplorerApi>, clock: Arc<dyn Clock>) -> Self {
        Self { explorer, clock }
    }
}

#[async_trait]
impl Analyzer for BehaviorAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Behavior
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        !ctx.using_fallback
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        let mut result = AnalyzerResult::new();
        let txs = self
            .explorer
            .transactions(info.chain, &info.address, BEHAVIOR_TX_SAMPLE, SortOrder::Desc)
            .await?;
        let now = self.clock.now_secs();

        if txs.len() >= MIN_TXS_FOR_FAILURE_RATIO {
            let failed = txs.iter().filter(|tx| tx.is_error).count();
            let ratio = failed as f64 / txs.len() as f64;
            let tier = if ratio > 0.5 {
                Some((Severity::High, 15))
            } else if ratio > 0.3 {
                Some((Severity::Medium, 10))
            } else {
                None
            };
            if let Some((severity, score)) = tier {
                result.push(
                    Finding::new(
                        FindingKind::FailedTransactions,
                        severity,
                        format!("{:.0}% of recent transactions failed", ratio * 100.0),
                        score,
                        NAME,
                    )
                    .with_evidence(serde_json::json!({ "failed": failed, "sampled": txs.len() })),
                );
            }
        }

        // With a known deployer only its own calls count; otherwise any caller
        let deployer = info.creator.as_deref();
        let privileged: BTreeSet<&str> = txs
            .iter()
            .filter(|tx| !tx.is_error && PRIVILEGED_CALL.is_match(&tx.function_name))
            .filter(|tx| deployer.map_or(true, |d| tx.from.eq_ignore_ascii_case(d)))
            .map(function_label)
            .collect();
        if !privileged.is_empty() {
            let description = match deployer {
                Some(_) => "Deployer called privileged functions recently",
                None => "Privileged functions were called recently",
            };
            result.push(
                Finding::new(FindingKind::PrivilegedActivity, Severity::Medium, description, 10, NAME)
                    .with_evidence(serde_json::json!({ "functions": privileged, "caller": deployer })),
            );
        }

        // Age is only meaningful when the creation record was found
        if info.creator.is_some() && info.age_in_days < 1 {
            result.push(Finding::new(
                FindingKind::NewContract,
                Severity::Medium,
                "Contract was deployed less than a day ago",
                10,
                NAME,
            ));
        }

        if let Some(latest) = txs.iter().map(|tx| tx.timestamp).max() {
            let idle_days = now.saturating_sub(latest) / DAY_SECS;
            if idle_days > DORMANT_AFTER_DAYS {
                result.push(Finding::new(
                    FindingKind::DormantContract,
                    Severity::Low,
                    format!("No transactions in the last {} days", idle_days),
                    5,
                    NAME,
                ));
            }
        }

        Ok(result)
    }
}
