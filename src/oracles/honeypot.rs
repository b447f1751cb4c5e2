//! Honeypot simulation service (honeypot.is)
//!
//! The service simulates a buy and a sell against the main pool and reports
//! whether the sell goes through and what it cost. Tokens without a pool come
//! back without a `honeypotResult`, which is treated as "not found".
//!
//! API: https://api.honeypot.is/v2/IsHoneypot?address={token}&chainID={id}

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{SecurityOracle, Verdict};
use crate::models::types::{AnalyzerResult, Chain, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::http::{get_json, Fetched};

const NAME: &str = "honeypot";

/// Chains the simulation service covers
const SUPPORTED_CHAINS: [Chain; 3] = [Chain::Ethereum, Chain::Base, Chain::Arbitrum];

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotResponse {
    #[serde(default)]
    pub honeypot_result: Option<HoneypotFlag>,
    #[serde(default)]
    pub simulation_success: bool,
    #[serde(default)]
    pub simulation_result: Option<SimulationResult>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotFlag {
    pub is_honeypot: bool,
    #[serde(default)]
    pub honeypot_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    #[serde(default)]
    pub buy_tax: f64,
    #[serde(default)]
    pub sell_tax: f64,
    #[serde(default)]
    pub transfer_tax: f64,
}

pub struct HoneypotOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HoneypotOracle {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Tax tier: (threshold %, severity, score)
fn tax_tier(worst_tax: f64) -> Option<(Severity, i32)> {
    if worst_tax > 50.0 {
        Some((Severity::Critical, 35))
    } else if worst_tax > 30.0 {
        Some((Severity::High, 25))
    } else if worst_tax > 15.0 {
        Some((Severity::Medium, 15))
    } else if worst_tax > 5.0 {
        Some((Severity::Low, 5))
    } else {
        None
    }
}

#[async_trait]
impl SecurityOracle for HoneypotOracle {
    type Raw = HoneypotResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    fn is_security_database(&self) -> bool {
        true
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<HoneypotResponse> {
        if !SUPPORTED_CHAINS.contains(&chain) {
            return Verdict::unchecked(format!("{} is not covered by the simulation service", chain));
        }

        let url = format!("{}/v2/IsHoneypot", self.base_url);
        let query = [
            ("address", address.to_string()),
            ("chainID", chain.chain_id().to_string()),
        ];
        match get_json::<HoneypotResponse>(&self.client, NAME, &url, &query).await {
            Ok(Fetched::Found(response)) if response.honeypot_result.is_none() => Verdict::NotFound,
            Ok(Fetched::Found(response)) => {
                info!(
                    "🍯 Honeypot check for {}: simulation_success={}",
                    address, response.simulation_success
                );
                Verdict::Checked(response)
            }
            Ok(Fetched::NotFound) => Verdict::NotFound,
            Ok(Fetched::RateLimited) => Verdict::RateLimited,
            Err(e) => Verdict::from_error(e),
        }
    }

    fn risk(&self, raw: &HoneypotResponse, _info: &ContractInfo) -> AnalyzerResult {
        let mut result = AnalyzerResult::new();
        let flag = raw.honeypot_result.clone().unwrap_or_default();

        if flag.is_honeypot {
            result.push(
                Finding::new(
                    FindingKind::HoneypotDetected,
                    Severity::Critical,
                    "Sell simulation failed: tokens can be bought but not sold",
                    50,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "reason": flag.honeypot_reason })),
            );
            return result;
        }

        let taxes = raw.simulation_result.clone().unwrap_or_default();
        let worst = taxes.buy_tax.max(taxes.sell_tax).max(taxes.transfer_tax);
        if let Some((severity, score)) = tax_tier(worst) {
            result.push(
                Finding::new(
                    FindingKind::HighTax,
                    severity,
                    format!("Simulated trading tax up to {:.1}%", worst),
                    score,
                    NAME,
                )
                .with_evidence(serde_json::json!({
                    "buy_tax": taxes.buy_tax,
                    "sell_tax": taxes.sell_tax,
                    "transfer_tax": taxes.transfer_tax,
                })),
            );
        } else if raw.simulation_success {
            result.push(Finding::new(
                FindingKind::HoneypotClear,
                Severity::Safe,
                "Buy and sell simulation succeeded with negligible tax",
                -10,
                NAME,
            ));
        }
        result
    }
}
