use async_trait::async_trait;
use std::sync::Arc;

use super::{SecurityOracle, Verdict};
use crate::models::types::{AnalyzerResult, Chain, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::sourcify::{SourcifyApi, SourcifyMatch};

const NAME: &str = "sourcify";

/// Decentralized verification lookup
pub struct SourcifyOracle {
    sourcify: Arc<dyn SourcifyApi>,
}

impl SourcifyOracle {
    pub fn new(sourcify: Arc<dyn SourcifyApi>) -> Self {
        Self { sourcify }
    }
}

#[async_trait]
impl SecurityOracle for SourcifyOracle {
    type Raw = SourcifyMatch;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<SourcifyMatch> {
        match self.sourcify.check_match(chain, address).await {
            Ok(SourcifyMatch::Missing) => Verdict::NotFound,
            Ok(level) => Verdict::Checked(level),
            Err(e) => Verdict::from_error(e),
        }
    }

    fn risk(&self, raw: &SourcifyMatch, _info: &ContractInfo) -> AnalyzerResult {
        let (description, delta) = match raw {
            SourcifyMatch::Full => ("Full match on Sourcify (bytecode and metadata)", -5),
            SourcifyMatch::Partial => ("Partial match on Sourcify (bytecode only)", -3),
            SourcifyMatch::Missing => return AnalyzerResult::new(),
        };
        AnalyzerResult::new().with(Finding::new(
            FindingKind::DecentralizedVerified,
            Severity::Safe,
            description,
            delta,
            NAME,
        ))
    }
}
