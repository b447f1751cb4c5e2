//! Scam database lookup (GoPlus token security)
//!
//! GoPlus reports string flags ("0"/"1") per token. Only flags that describe
//! outright scams or hidden control are scored here; capabilities that the
//! source rules already detect (mintable, blacklist) are left to them.
//!
//! API: https://api.gopluslabs.io/api/v1/token_security/{chain_id}?contract_addresses={token}

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::{SecurityOracle, Verdict};
use crate::models::types::{AnalyzerResult, Chain, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::http::{get_json, Fetched};

const NAME: &str = "scam_database";

/// GoPlus business code for "too many requests"
const GOPLUS_RATE_LIMIT_CODE: i64 = 4029;

#[derive(Debug, Deserialize)]
struct GoPlusEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Option<HashMap<String, serde_json::Value>>,
}

/// Flags reported for one token
#[derive(Debug, Clone, Default)]
pub struct TokenSecurity {
    flags: HashMap<String, String>,
}

impl TokenSecurity {
    fn from_value(value: &serde_json::Value) -> Self {
        let flags = value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self { flags }
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.get(flag).map(|v| v == "1").unwrap_or(false)
    }
}

/// (flag, severity, score, description)
const SCAM_FLAGS: [(&str, Severity, i32, &str); 7] = [
    ("is_honeypot", Severity::Critical, 40, "Listed as a honeypot"),
    ("honeypot_with_same_creator", Severity::High, 20, "Creator has deployed honeypots before"),
    ("is_airdrop_scam", Severity::High, 20, "Listed as an airdrop scam"),
    ("cannot_sell_all", Severity::High, 15, "Holders cannot sell their full balance"),
    ("owner_change_balance", Severity::High, 15, "Owner can modify holder balances"),
    ("hidden_owner", Severity::Medium, 10, "Contract has a hidden owner"),
    ("selfdestruct", Severity::Medium, 10, "Contract can self-destruct"),
];

pub struct ScamDatabaseOracle {
    client: reqwest::Client,
    base_url: String,
}

impl ScamDatabaseOracle {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SecurityOracle for ScamDatabaseOracle {
    type Raw = TokenSecurity;

    fn name(&self) -> &'static str {
        NAME
    }

    fn is_security_database(&self) -> bool {
        true
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<TokenSecurity> {
        let url = format!("{}/api/v1/token_security/{}", self.base_url, chain.chain_id());
        let query = [("contract_addresses", address.to_lowercase())];

        let envelope = match get_json::<GoPlusEnvelope>(&self.client, NAME, &url, &query).await {
            Ok(Fetched::Found(envelope)) => envelope,
            Ok(Fetched::NotFound) => return Verdict::NotFound,
            Ok(Fetched::RateLimited) => return Verdict::RateLimited,
            Err(e) => return Verdict::from_error(e),
        };

        if envelope.code == GOPLUS_RATE_LIMIT_CODE || envelope.message.to_lowercase().contains("limit") {
            return Verdict::RateLimited;
        }
        if envelope.code != 1 {
            return Verdict::unchecked(format!("code {}: {}", envelope.code, envelope.message));
        }

        let results = envelope.result.unwrap_or_default();
        let entry = results
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(address))
            .map(|(_, value)| value);

        match entry {
            Some(value) if value.as_object().map(|o| !o.is_empty()).unwrap_or(false) => {
                Verdict::Checked(TokenSecurity::from_value(value))
            }
            _ => Verdict::NotFound,
        }
    }

    fn risk(&self, raw: &TokenSecurity, _info: &ContractInfo) -> AnalyzerResult {
        let mut result = AnalyzerResult::new();

        for (flag, severity, score, description) in SCAM_FLAGS {
            if raw.is_set(flag) {
                result.push(
                    Finding::new(FindingKind::ScamDatabaseFlag, severity, description, score, NAME)
                        .with_evidence(serde_json::json!({ "flag": flag })),
                );
            }
        }

        if result.findings.is_empty() {
            let (description, delta) = if raw.is_set("trust_list") {
                ("Token is on the security database trust list", -15)
            } else {
                ("No scam flags in the security database", -5)
            };
            result.push(Finding::new(
                FindingKind::ScamDatabaseClear,
                Severity::Safe,
                description,
                delta,
                NAME,
            ));
        }
        result
    }
}
