//! Ownership centralization
//!
//! Reads the owner through `owner()` (or `getOwner()`) and classifies it:
//! renounced, contract-owned (multisig or timelock), issuer EOA, or plain EOA.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::contract::{is_contract, read_owner, OwnerRead};
use crate::providers::rpc::ChainReader;
use crate::utils::constants::{is_burn_address, is_issuer_controlled_token};

const NAME: &str = "ownership";

pub struct OwnershipAnalyzer {
    reader: Arc<dyn ChainReader>,
}

impl OwnershipAnalyzer {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Analyzer for OwnershipAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Ownership
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        !ctx.using_fallback
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        let owner = match read_owner(self.reader.as_ref(), info.chain, &info.address).await? {
            OwnerRead::Owner(owner) => owner,
            OwnerRead::NoOwnerFunction => {
                return Ok(AnalyzerResult::new().with(Finding::info(
                    FindingKind::NoOwnerFunction,
                    "Contract exposes no owner() or getOwner() function",
                    NAME,
                )));
            }
        };
        debug!(contract = %info.address, %owner, "Owner resolved");
        let evidence = serde_json::json!({ "owner": owner });

        let finding = if is_burn_address(&owner) {
            Finding::new(
                FindingKind::RenouncedOwnership,
                Severity::Safe,
                "Ownership is renounced",
                -15,
                NAME,
            )
        } else if is_contract(self.reader.as_ref(), info.chain, &owner).await? {
            Finding::new(
                FindingKind::OwnerIsContract,
                Severity::Low,
                "Owner is a contract (likely multisig or timelock)",
                5,
                NAME,
            )
        } else if is_issuer_controlled_token(&info.address) {
            Finding::new(
                FindingKind::IssuerControlled,
                Severity::Low,
                "Owned by the token's regulated issuer",
                5,
                NAME,
            )
        } else {
            Finding::new(
                FindingKind::OwnershipCentralized,
                Severity::High,
                "A single externally owned account controls the contract",
                20,
                NAME,
            )
        };
        Ok(AnalyzerResult::new().with(finding.with_evidence(evidence)))
    }
}
