//! Security Oracles Module - external opinions about a contract
//!
//! Every oracle answers with a tagged `Verdict`. Only `Checked` carries data
//! to score; the other variants become zero-score findings explaining why the
//! check was skipped. Adapters never return errors past this boundary.

pub mod creator_history;
pub mod explorer_verification;
pub mod honeypot;
pub mod scam_db;
pub mod sourcify;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::errors::{AppError, ErrorCode};
use crate::models::types::{AnalyzerResult, Chain, ContractInfo, FindingKind, ScanDepth};

pub use creator_history::CreatorHistoryOracle;
pub use explorer_verification::ExplorerVerificationOracle;
pub use honeypot::HoneypotOracle;
pub use scam_db::ScamDatabaseOracle;
pub use sourcify::SourcifyOracle;

/// Outcome of one oracle lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<R> {
    /// Lookup could not be performed (network, timeout, unsupported chain)
    Unchecked { reason: String },
    RateLimited,
    /// Oracle has no record of the contract
    NotFound,
    Checked(R),
}

impl<R> Verdict<R> {
    pub fn unchecked(reason: impl Into<String>) -> Self {
        Self::Unchecked {
            reason: reason.into(),
        }
    }

    /// Classify a provider error into a verdict
    pub fn from_error(err: AppError) -> Self {
        match err.code {
            ErrorCode::UpstreamRateLimited => Self::RateLimited,
            ErrorCode::UpstreamNotFound => Self::NotFound,
            _ => Self::unchecked(err.to_string()),
        }
    }

    pub fn status(&self) -> OracleStatus {
        match self {
            Self::Unchecked { .. } => OracleStatus::Unchecked,
            Self::RateLimited => OracleStatus::RateLimited,
            Self::NotFound => OracleStatus::NotFound,
            Self::Checked(_) => OracleStatus::Checked,
        }
    }
}

/// Verdict tag without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleStatus {
    Checked,
    NotFound,
    RateLimited,
    Unchecked,
}

/// An external source of security information
#[async_trait]
pub trait SecurityOracle: Send + Sync {
    type Raw: Send;

    fn name(&self) -> &'static str;

    /// Depths at which this oracle participates
    fn runs_at(&self, _depth: ScanDepth) -> bool {
        true
    }

    /// Scam/honeypot databases count towards "unknown to every database"
    fn is_security_database(&self) -> bool {
        false
    }

    async fn check(&self, address: &str, chain: Chain) -> Verdict<Self::Raw>;

    /// Score a checked payload
    fn risk(&self, raw: &Self::Raw, info: &ContractInfo) -> AnalyzerResult;
}

/// What one oracle contributed to a run
#[derive(Debug, Clone)]
pub struct OracleContribution {
    pub name: &'static str,
    pub status: OracleStatus,
    pub is_security_database: bool,
    pub result: AnalyzerResult,
}

impl OracleContribution {
    /// Zero contribution for an oracle that never answered
    pub fn timed_out(name: &'static str, is_security_database: bool, secs: u64) -> Self {
        Self {
            name,
            status: OracleStatus::Unchecked,
            is_security_database,
            result: AnalyzerResult::unavailable(
                FindingKind::OracleUnavailable,
                format!("{} did not answer within {}s", name, secs),
                name,
            ),
        }
    }
}

/// Object-safe face of `SecurityOracle`, so the pipeline can hold a mixed list
#[async_trait]
pub trait OracleAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn runs_at(&self, depth: ScanDepth) -> bool;
    fn is_security_database(&self) -> bool;
    async fn evaluate(&self, info: &ContractInfo) -> OracleContribution;
}

#[async_trait]
impl<T: SecurityOracle> OracleAdapter for T {
    fn name(&self) -> &'static str {
        SecurityOracle::name(self)
    }

    fn runs_at(&self, depth: ScanDepth) -> bool {
        SecurityOracle::runs_at(self, depth)
    }

    fn is_security_database(&self) -> bool {
        SecurityOracle::is_security_database(self)
    }

    async fn evaluate(&self, info: &ContractInfo) -> OracleContribution {
        let name = SecurityOracle::name(self);
        let verdict = self.check(&info.address, info.chain).await;
        let status = verdict.status();

        let result = match verdict {
            Verdict::Checked(raw) => self.risk(&raw, info),
            Verdict::NotFound => {
                debug!(oracle = name, address = %info.address, "No record");
                AnalyzerResult::unavailable(
                    FindingKind::OracleNotFound,
                    format!("{} has no record of this contract", name),
                    name,
                )
            }
            Verdict::RateLimited => {
                warn!(oracle = name, "⏳ Oracle rate limited, check skipped");
                AnalyzerResult::unavailable(
                    FindingKind::OracleRateLimited,
                    format!("{} rate limited the request; check skipped", name),
                    name,
                )
            }
            Verdict::Unchecked { reason } => {
                warn!(oracle = name, %reason, "⚠️ Oracle unavailable");
                AnalyzerResult::unavailable(
                    FindingKind::OracleUnavailable,
                    format!("{} unavailable: {}", name, reason),
                    name,
                )
            }
        };

        OracleContribution {
            name,
            status,
            is_security_database: SecurityOracle::is_security_database(self),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{Finding, Severity};

    struct FixedOracle(Verdict<u32>);

    #[async_trait]
    impl SecurityOracle for FixedOracle {
        type Raw = u32;

        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn check(&self, _address: &str, _chain: Chain) -> Verdict<u32> {
            self.0.clone()
        }

        fn risk(&self, raw: &u32, _info: &ContractInfo) -> AnalyzerResult {
            AnalyzerResult::new().with(Finding::new(
                FindingKind::ScamDatabaseFlag,
                Severity::High,
                "flagged",
                *raw as i32,
                "fixed",
            ))
        }
    }

    fn info() -> ContractInfo {
        ContractInfo::new("0x1111111111111111111111111111111111111111", Chain::Ethereum)
    }

    #[tokio::test]
    async fn test_checked_is_scored() {
        let contribution = FixedOracle(Verdict::Checked(12)).evaluate(&info()).await;
        assert_eq!(contribution.status, OracleStatus::Checked);
        assert_eq!(contribution.result.score_delta, 12);
    }

    #[tokio::test]
    async fn test_degraded_verdicts_score_zero() {
        for (verdict, kind) in [
            (Verdict::RateLimited, FindingKind::OracleRateLimited),
            (Verdict::NotFound, FindingKind::OracleNotFound),
            (Verdict::unchecked("boom"), FindingKind::OracleUnavailable),
        ] {
            let contribution = FixedOracle(verdict).evaluate(&info()).await;
            assert_eq!(contribution.result.score_delta, 0);
            assert_eq!(contribution.result.findings[0].kind, kind);
        }
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(Verdict::<()>::from_error(AppError::rate_limited("x")), Verdict::RateLimited);
        assert_eq!(Verdict::<()>::from_error(AppError::not_found("x")), Verdict::NotFound);
        assert_eq!(
            Verdict::<()>::from_error(AppError::upstream_timeout("slow")).status(),
            OracleStatus::Unchecked
        );
    }
}
