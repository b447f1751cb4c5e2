//! Analyzers Module - internal risk checks
//!
//! Each analyzer inspects one aspect of the contract and returns an
//! `AnalyzerResult`. `run_guarded` wraps every call so an error or timeout
//! becomes a zero contribution with an informational finding.

pub mod behavior;
pub mod bytecode;
pub mod holders;
pub mod liquidity;
pub mod ownership;
pub mod source_patterns;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, FindingKind, ScanDepth};

pub use behavior::BehaviorAnalyzer;
pub use bytecode::BytecodeAnalyzer;
pub use holders::HolderAnalyzer;
pub use liquidity::LiquidityAnalyzer;
pub use ownership::OwnershipAnalyzer;
pub use source_patterns::SourcePatternAnalyzer;

/// Which internal bucket an analyzer feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerCategory {
    Code,
    Ownership,
    Liquidity,
    Behavior,
}

/// Inputs every analyzer may gate on
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub info: &'a ContractInfo,
    pub depth: ScanDepth,
    pub using_fallback: bool,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> AnalyzerCategory;

    /// Depth and resolution-mode gating
    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool;

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult>;
}

/// One analyzer's contribution, successful or degraded
#[derive(Debug, Clone)]
pub struct AnalyzerOutcome {
    pub name: &'static str,
    pub category: AnalyzerCategory,
    /// False when the analyzer errored or timed out
    pub produced_data: bool,
    pub result: AnalyzerResult,
}

/// Run one analyzer under a timeout, degrading failures to zero
pub async fn run_guarded(analyzer: &dyn Analyzer, info: &ContractInfo, timeout: Duration) -> AnalyzerOutcome {
    let name = analyzer.name();
    let started = Instant::now();

    let (produced_data, result) = match tokio::time::timeout(timeout, analyzer.analyze(info)).await {
        Ok(Ok(result)) => {
            debug!(
                analyzer = name,
                delta = result.score_delta,
                findings = result.findings.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Analyzer finished"
            );
            (true, result)
        }
        Ok(Err(e)) => {
            warn!(analyzer = name, error = %e, "⚠️ Analyzer failed, contributing zero");
            (
                false,
                AnalyzerResult::unavailable(
                    FindingKind::AnalyzerUnavailable,
                    format!("{} analysis unavailable: {}", name, e.message),
                    name,
                ),
            )
        }
        Err(_) => {
            warn!(analyzer = name, timeout_secs = timeout.as_secs(), "⏱️ Analyzer timed out");
            (
                false,
                AnalyzerResult::unavailable(
                    FindingKind::AnalyzerUnavailable,
                    format!("{} analysis timed out after {}s", name, timeout.as_secs()),
                    name,
                ),
            )
        }
    };

    AnalyzerOutcome {
        name,
        category: analyzer.category(),
        produced_data,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::AppError;
    use crate::models::types::Chain;

    struct Slow;

    #[async_trait]
    impl Analyzer for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn category(&self) -> AnalyzerCategory {
            AnalyzerCategory::Behavior
        }
        fn should_run(&self, _: &AnalysisContext<'_>) -> bool {
            true
        }
        async fn analyze(&self, _: &ContractInfo) -> AppResult<AnalyzerResult> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AnalyzerResult::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl Analyzer for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn category(&self) -> AnalyzerCategory {
            AnalyzerCategory::Ownership
        }
        fn should_run(&self, _: &AnalysisContext<'_>) -> bool {
            true
        }
        async fn analyze(&self, _: &ContractInfo) -> AppResult<AnalyzerResult> {
            Err(AppError::upstream("rpc down"))
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_zero() {
        let info = ContractInfo::new("0xabc", Chain::Ethereum);
        let outcome = run_guarded(&Slow, &info, Duration::from_millis(20)).await;
        assert!(!outcome.produced_data);
        assert_eq!(outcome.result.score_delta, 0);
        assert_eq!(outcome.result.findings[0].kind, FindingKind::AnalyzerUnavailable);
    }

    #[tokio::test]
    async fn test_error_degrades_to_zero() {
        let info = ContractInfo::new("0xabc", Chain::Ethereum);
        let outcome = run_guarded(&Broken, &info, Duration::from_secs(1)).await;
        assert!(!outcome.produced_data);
        assert_eq!(outcome.category, AnalyzerCategory::Ownership);
        assert!(outcome.result.findings[0].description.contains("rpc down"));
    }
}
