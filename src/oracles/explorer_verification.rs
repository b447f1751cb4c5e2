//! Explorer verification status as an oracle
//!
//! Re-queries the explorer independently of the resolver so the verdict is
//! recorded even when resolution came from another source.

use async_trait::async_trait;
use std::sync::Arc;

use super::{SecurityOracle, Verdict};
use crate::models::types::{AnalyzerResult, Chain, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::explorer::ExplorerApi;

const NAME: &str = "explorer_verification";

pub struct ExplorerVerificationOracle {
    explorer: Arc<dyn ExplorerApi>,
}

impl ExplorerVerificationOracle {
    pub fn new(explorer: Arc<dyn ExplorerApi>) -> Self {
        Self { explorer }
    }
}

/// Verification status reported by the explorer
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationStatus {
    pub verified: bool,
    pub contract_name: Option<String>,
}

#[async_trait]
impl SecurityOracle for ExplorerVerificationOracle {
    type Raw = VerificationStatus;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<VerificationStatus> {
        match self.explorer.source_code(chain, address).await {
            Ok(Some(source)) => Verdict::Checked(VerificationStatus {
                verified: true,
                contract_name: source.contract_name,
            }),
            Ok(None) => Verdict::Checked(VerificationStatus {
                verified: false,
                contract_name: None,
            }),
            Err(e) => Verdict::from_error(e),
        }
    }

    fn risk(&self, raw: &VerificationStatus, _info: &ContractInfo) -> AnalyzerResult {
        if raw.verified {
            AnalyzerResult::new().with(
                Finding::new(
                    FindingKind::SourceVerified,
                    Severity::Safe,
                    "Source code is verified on the block explorer",
                    -5,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "contract_name": raw.contract_name })),
            )
        } else {
            AnalyzerResult::new().with(Finding::new(
                FindingKind::SourceUnverified,
                Severity::Medium,
                "Source code is not verified; behavior cannot be audited",
                15,
                NAME,
            ))
        }
    }
}
