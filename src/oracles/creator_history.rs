//! Creator history: what else has this deployer shipped?
//!
//! Pulls the creator's recent transactions from the explorer, extracts its
//! deployments and inspects at most `MAX_CREATOR_CONTRACTS_INSPECTED` of them
//! concurrently. Four independent patterns are scored:
//!
//! - serial deployer: 10 or more deployments
//! - 3 or more abandoned contracts
//! - rapid deployment: 5 or more deployments in the last 30 days
//! - abandonment rate above 50% among inspected contracts
//!
//! A contract is abandoned when it is older than 7 days and either has fewer
//! than 10 lifetime transactions or saw no transaction in the last 30 days.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::{SecurityOracle, Verdict};
use crate::models::types::{
    AnalyzerResult, Chain, ContractInfo, Finding, FindingKind, ScanDepth, Severity,
};
use crate::providers::explorer::{ExplorerApi, SortOrder};
use crate::utils::cache::Clock;
use crate::utils::constants::MAX_CREATOR_CONTRACTS_INSPECTED;

const NAME: &str = "creator_history";

const DAY_SECS: u64 = 86_400;

/// Creator transactions scanned for deployments
const CREATOR_TX_SAMPLE: usize = 1_000;

/// Transactions fetched per inspected contract; fewer means "low activity"
const ACTIVITY_SAMPLE: usize = 10;

const SERIAL_DEPLOYER_MIN: usize = 10;
const ABANDONED_MIN: usize = 3;
const RAPID_DEPLOYMENT_MIN: usize = 5;
const ABANDONMENT_RATE_MAX: f64 = 0.5;

/// Activity summary of one deployed contract
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedContract {
    pub address: String,
    pub deployed_at: u64,
    /// Capped at the activity sample size
    pub tx_count: usize,
    pub last_activity: Option<u64>,
}

impl DeployedContract {
    pub fn is_abandoned(&self, now: u64) -> bool {
        let age_days = now.saturating_sub(self.deployed_at) / DAY_SECS;
        if age_days <= 7 {
            return false;
        }
        let idle = self
            .last_activity
            .map(|ts| now.saturating_sub(ts) > 30 * DAY_SECS)
            .unwrap_or(true);
        self.tx_count < ACTIVITY_SAMPLE || idle
    }
}

/// What the explorer knows about the creator
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorProfile {
    pub creator: String,
    /// Unix seconds of every deployment seen, excluding the analyzed contract
    pub deployments: Vec<u64>,
    pub inspected: Vec<DeployedContract>,
    /// Clock reading when the profile was taken
    pub observed_at: u64,
}

pub struct CreatorHistoryOracle {
    explorer: Arc<dyn ExplorerApi>,
    clock: Arc<dyn Clock>,
}

impl CreatorHistoryOracle {
    pub fn new(explorer: Arc<dyn ExplorerApi>, clock: Arc<dyn Clock>) -> Self {
        Self { explorer, clock }
    }

    async fn inspect(&self, chain: Chain, address: String, deployed_at: u64) -> Option<DeployedContract> {
        let txs = match self
            .explorer
            .transactions(chain, &address, ACTIVITY_SAMPLE, SortOrder::Desc)
            .await
        {
            Ok(txs) => txs,
            Err(e) => {
                debug!(%address, error = %e, "Skipping creator contract");
                return None;
            }
        };
        Some(DeployedContract {
            last_activity: txs.iter().map(|tx| tx.timestamp).max(),
            tx_count: txs.len(),
            address,
            deployed_at,
        })
    }
}

#[async_trait]
impl SecurityOracle for CreatorHistoryOracle {
    type Raw = CreatorProfile;

    fn name(&self) -> &'static str {
        NAME
    }

    fn runs_at(&self, depth: ScanDepth) -> bool {
        depth.is_deep()
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<CreatorProfile> {
        let creator = match self.explorer.contract_creation(chain, address).await {
            Ok(Some(creation)) => creation.creator,
            Ok(None) => return Verdict::NotFound,
            Err(e) => return Verdict::from_error(e),
        };

        let txs = match self
            .explorer
            .transactions(chain, &creator, CREATOR_TX_SAMPLE, SortOrder::Desc)
            .await
        {
            Ok(txs) => txs,
            Err(e) => return Verdict::from_error(e),
        };

        let target = address.to_lowercase();
        let deployed: Vec<(String, u64)> = txs
            .into_iter()
            .filter(|tx| tx.is_deployment() && tx.contract_address != target)
            .map(|tx| (tx.contract_address, tx.timestamp))
            .collect();

        info!(
            "👷 Creator {} has {} other deployments, inspecting up to {}",
            creator,
            deployed.len(),
            MAX_CREATOR_CONTRACTS_INSPECTED
        );

        let inspections = deployed
            .iter()
            .take(MAX_CREATOR_CONTRACTS_INSPECTED)
            .map(|(contract, ts)| self.inspect(chain, contract.clone(), *ts));
        let inspected = join_all(inspections).await.into_iter().flatten().collect();

        Verdict::Checked(CreatorProfile {
            creator,
            deployments: deployed.iter().map(|(_, ts)| *ts).collect(),
            inspected,
            observed_at: self.clock.now_secs(),
        })
    }

    fn risk(&self, raw: &CreatorProfile, _info: &ContractInfo) -> AnalyzerResult {
        let mut result = AnalyzerResult::new();
        let now = raw.observed_at;

        let total = raw.deployments.len();
        if total >= SERIAL_DEPLOYER_MIN {
            result.push(
                Finding::new(
                    FindingKind::SerialDeployer,
                    Severity::Medium,
                    format!("Creator has deployed {} other contracts", total),
                    10,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "creator": raw.creator, "deployments": total })),
            );
        }

        let abandoned: Vec<&str> = raw
            .inspected
            .iter()
            .filter(|c| c.is_abandoned(now))
            .map(|c| c.address.as_str())
            .collect();
        if abandoned.len() >= ABANDONED_MIN {
            result.push(
                Finding::new(
                    FindingKind::AbandonedContracts,
                    Severity::High,
                    format!("{} of the creator's contracts look abandoned", abandoned.len()),
                    15,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "abandoned": abandoned })),
            );
        }

        let recent = raw
            .deployments
            .iter()
            .filter(|ts| now.saturating_sub(**ts) <= 30 * DAY_SECS)
            .count();
        if recent >= RAPID_DEPLOYMENT_MIN {
            result.push(Finding::new(
                FindingKind::RapidDeployment,
                Severity::Medium,
                format!("Creator deployed {} contracts in the last 30 days", recent),
                10,
                NAME,
            ));
        }

        if !raw.inspected.is_empty() {
            let rate = abandoned.len() as f64 / raw.inspected.len() as f64;
            if rate > ABANDONMENT_RATE_MAX {
                result.push(
                    Finding::new(
                        FindingKind::HighAbandonmentRate,
                        Severity::High,
                        format!("{:.0}% of inspected creator contracts are abandoned", rate * 100.0),
                        15,
                        NAME,
                    )
                    .with_evidence(serde_json::json!({
                        "inspected": raw.inspected.len(),
                        "abandoned": abandoned.len(),
                    })),
                );
            }
        }

        if result.findings.is_empty() {
            result.push(Finding::new(
                FindingKind::CreatorClean,
                Severity::Safe,
                "Creator history shows no serial or abandoned deployments",
                -5,
                NAME,
            ));
        }
        result
    }
}
