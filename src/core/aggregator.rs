//! Score Aggregator
//!
//! Turns analyzer and oracle contributions into the final `RiskRecord`.
//! Order is fixed:
//!
//! 1. obvious-scam short-circuit (score 95)
//! 2. weighted sum: `clamp(50 + 0.4 * internal + 0.6 * external, 0, 100)`
//! 3. known-safe cap (15)
//! 4. verified stablecoin cap (20)
//! 5. round

use std::collections::BTreeMap;
use tracing::debug;

use crate::analyzers::{AnalyzerCategory, AnalyzerOutcome};
use crate::models::types::{
    ContractInfo, Finding, FindingKind, RiskLevel, RiskRecord, ScanDepth, Severity,
};
use crate::oracles::{OracleContribution, OracleStatus};
use crate::utils::constants::{is_known_safe_token, matches_stablecoin};

const SOURCE: &str = "aggregator";

pub const BASE_SCORE: f64 = 50.0;
pub const INTERNAL_WEIGHT: f64 = 0.4;
pub const EXTERNAL_WEIGHT: f64 = 0.6;
pub const SCAM_NAME_SCORE: u8 = 95;
pub const KNOWN_SAFE_CAP: f64 = 15.0;
pub const STABLECOIN_CAP: f64 = 20.0;

const ESTABLISHED_AGE_DAYS: u64 = 30;
const LOW_ACTIVITY_TX_COUNT: u64 = 10;

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct Aggregation<'a> {
    pub info: &'a ContractInfo,
    pub depth: ScanDepth,
    pub using_fallback: bool,
    pub trace: Vec<String>,
    /// Scam keyword found in name or symbol, computed once by the pipeline
    pub scam_keyword: Option<&'static str>,
    pub analyzers: Vec<AnalyzerOutcome>,
    pub oracles: Vec<OracleContribution>,
    /// Unix seconds
    pub analyzed_at: u64,
}

/// Findings the aggregator derives from the resolved info and oracle statuses
pub fn derived_findings(info: &ContractInfo, oracles: &[OracleContribution]) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !info.verified && info.transaction_count == 0 && info.creator.is_none() {
        findings.push(Finding::new(
            FindingKind::ContractNotFound,
            Severity::High,
            "Contract is unverified, has no transactions and no known creator",
            40,
            SOURCE,
        ));
    }

    let established = info.age_in_days > ESTABLISHED_AGE_DAYS;
    let databases: Vec<&OracleContribution> = oracles.iter().filter(|o| o.is_security_database).collect();
    let known_to_any = databases.iter().any(|o| o.status == OracleStatus::Checked);
    let missing_from_some = databases.iter().any(|o| o.status == OracleStatus::NotFound);
    if established && !known_to_any && missing_from_some {
        findings.push(Finding::new(
            FindingKind::NotInSecurityDatabases,
            Severity::Medium,
            format!(
                "{} days old but unknown to every security database",
                info.age_in_days
            ),
            10,
            SOURCE,
        ));
    }

    if established && info.transaction_count < LOW_ACTIVITY_TX_COUNT {
        findings.push(Finding::new(
            FindingKind::LowActivity,
            Severity::Medium,
            format!(
                "Only {} transactions in {} days",
                info.transaction_count, info.age_in_days
            ),
            15,
            SOURCE,
        ));
    }

    findings
}

/// Weighted sum, clamped to the score range
pub fn weighted_score(internal: i32, external: i32) -> f64 {
    (BASE_SCORE + INTERNAL_WEIGHT * internal as f64 + EXTERNAL_WEIGHT * external as f64).clamp(0.0, 100.0)
}

/// Allow-list and stablecoin caps, applied after the weighted sum
pub fn apply_overrides(score: f64, info: &ContractInfo) -> f64 {
    if is_known_safe_token(&info.address) {
        score.min(KNOWN_SAFE_CAP)
    } else if info.verified && matches_stablecoin(token_labels(info)) {
        score.min(STABLECOIN_CAP)
    } else {
        score
    }
}

/// Name and symbol, the labels scam and stablecoin keywords are matched against
pub fn token_labels(info: &ContractInfo) -> Vec<&str> {
    [info.name.as_deref(), info.symbol.as_deref()]
        .into_iter()
        .flatten()
        .collect()
}

fn confidence(agg: &Aggregation<'_>) -> f64 {
    let produced = |category: AnalyzerCategory| {
        agg.analyzers
            .iter()
            .any(|a| a.category == category && a.produced_data)
    };

    let mut confidence = 0.5;
    if agg.info.has_source() && produced(AnalyzerCategory::Code) {
        confidence += 0.15;
    }
    if produced(AnalyzerCategory::Ownership) {
        confidence += 0.10;
    }
    if produced(AnalyzerCategory::Liquidity) {
        confidence += 0.10;
    }
    if agg.info.age_in_days > 7 {
        confidence += 0.05;
    }
    let checked = agg
        .oracles
        .iter()
        .filter(|o| o.status == OracleStatus::Checked)
        .count();
    confidence += 0.05 * checked as f64;

    (confidence.min(1.0) * 100.0).round() / 100.0
}

fn security_checks(info: &ContractInfo, findings: &[Finding], using_fallback: bool) -> BTreeMap<String, bool> {
    let has = |kind: FindingKind| findings.iter().any(|f| f.kind == kind);

    [
        ("source_verified", info.verified),
        ("is_proxy", info.is_proxy),
        ("ownership_renounced", has(FindingKind::RenouncedOwnership)),
        ("liquidity_locked", has(FindingKind::LiquidityLocked)),
        ("honeypot_free", has(FindingKind::HoneypotClear)),
        ("scam_database_clean", has(FindingKind::ScamDatabaseClear)),
        ("known_safe_token", is_known_safe_token(&info.address)),
        ("fallback_mode", using_fallback),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

fn headline(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "✅ LOW RISK - No major red flags. Standard caution still applies.",
        RiskLevel::Medium => "🟠 MEDIUM RISK - Review the findings before interacting.",
        RiskLevel::High => "🔴 HIGH RISK - Significant red flags. Avoid unless you understand them.",
        RiskLevel::Critical => "💀 CRITICAL RISK - Do not interact with this contract.",
    }
}

fn advice(finding: &Finding) -> String {
    let text = match finding.kind {
        FindingKind::ObviousScamName => "Name or symbol advertises a scam; treat as malicious",
        FindingKind::HoneypotDetected => "Sell simulation failed: you may not be able to sell",
        FindingKind::HighTax => "Trading tax is high; expect large losses on each trade",
        FindingKind::OwnerMint => "Owner can mint unlimited supply and dilute holders",
        FindingKind::Blacklist => "Owner can blacklist wallets and block selling",
        FindingKind::AdjustableFees => "Owner can raise fees at any time",
        FindingKind::BalanceManipulation => "Owner can rewrite balances directly",
        FindingKind::SelfDestruct => "Contract can be destroyed with funds inside",
        FindingKind::OwnershipCentralized => "A single wallet controls the contract; check for a multisig",
        FindingKind::RugCapable => "Deployer can pull the liquidity pool",
        FindingKind::LiquidityUnlocked => "Liquidity is not locked and can be withdrawn",
        FindingKind::ContractNotFound => "Nothing is known about this address; double-check it",
        FindingKind::ScamDatabaseFlag => "Security databases flag this token",
        FindingKind::HolderConcentration => "Supply is concentrated in few wallets",
        FindingKind::AbandonedContracts | FindingKind::HighAbandonmentRate => {
            "Creator has a history of abandoned contracts"
        }
        FindingKind::FailedTransactions => "Many recent transactions fail; sells may be blocked",
        _ => return finding.description.clone(),
    };
    text.to_string()
}

fn recommendations(level: RiskLevel, findings: &[Finding], using_fallback: bool) -> Vec<String> {
    let mut out = vec![headline(level).to_string()];

    let mut seen = Vec::new();
    for finding in findings {
        if finding.severity >= Severity::High && !seen.contains(&finding.kind) {
            seen.push(finding.kind);
            out.push(advice(finding));
        }
    }

    if using_fallback {
        out.push(
            "Source could not be retrieved; analysis used on-chain reads only and is less reliable".to_string(),
        );
    }
    out
}

fn rfc3339(secs: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

pub fn aggregate(agg: Aggregation<'_>) -> RiskRecord {
    let info = agg.info;
    let mut findings: Vec<Finding> = Vec::new();

    let score = if let Some(keyword) = agg.scam_keyword {
        findings.push(
            Finding::new(
                FindingKind::ObviousScamName,
                Severity::Critical,
                format!("Name or symbol contains \"{}\"", keyword),
                SCAM_NAME_SCORE as i32 - BASE_SCORE as i32,
                SOURCE,
            )
            .with_evidence(serde_json::json!({ "keyword": keyword })),
        );
        SCAM_NAME_SCORE
    } else {
        let internal: i32 = agg.analyzers.iter().map(|a| a.result.score_delta).sum();
        let derived = derived_findings(info, &agg.oracles);
        let external: i32 = agg.oracles.iter().map(|o| o.result.score_delta).sum::<i32>()
            + derived.iter().map(|f| f.score_delta).sum::<i32>();

        for outcome in &agg.analyzers {
            findings.extend(outcome.result.findings.iter().cloned());
        }
        for oracle in &agg.oracles {
            findings.extend(oracle.result.findings.iter().cloned());
        }
        findings.extend(derived);

        let weighted = weighted_score(internal, external);
        let capped = apply_overrides(weighted, info);
        debug!(
            address = %info.address,
            internal,
            external,
            weighted,
            capped,
            "Score aggregated"
        );
        capped.round() as u8
    };

    if agg.using_fallback {
        findings.push(Finding::info(
            FindingKind::FallbackMode,
            "Analyzed from on-chain reads only; source-based checks were skipped",
            SOURCE,
        ));
    }

    let level = RiskLevel::from_score(score);
    RiskRecord {
        address: info.address.clone(),
        chain: info.chain,
        scan_depth: agg.depth,
        score,
        level,
        confidence: confidence(&agg),
        contract_name: info.contract_name.clone(),
        token_name: info.name.clone(),
        token_symbol: info.symbol.clone(),
        using_fallback: agg.using_fallback,
        resolution_trace: agg.trace.clone(),
        security_checks: security_checks(info, &findings, agg.using_fallback),
        recommendations: recommendations(level, &findings, agg.using_fallback),
        findings,
        analyzed_at: rfc3339(agg.analyzed_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{AnalyzerResult, Chain};

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const TOKEN: &str = "0x1111111111111111111111111111111111111111";

    fn outcome(category: AnalyzerCategory, delta: i32) -> AnalyzerOutcome {
        let mut result = AnalyzerResult::new();
        if delta != 0 {
            result.push(Finding::new(FindingKind::OwnerMint, Severity::High, "mint", delta, "test"));
        }
        AnalyzerOutcome {
            name: "test",
            category,
            produced_data: true,
            result,
        }
    }

    fn oracle(status: OracleStatus, is_db: bool, delta: i32) -> OracleContribution {
        let mut result = AnalyzerResult::new();
        if delta != 0 {
            result.push(Finding::new(FindingKind::HighTax, Severity::Medium, "tax", delta, "oracle"));
        }
        OracleContribution {
            name: "oracle",
            status,
            is_security_database: is_db,
            result,
        }
    }

    fn verified(address: &str) -> ContractInfo {
        let mut info = ContractInfo::new(address, Chain::Ethereum);
        info.verified = true;
        info.source_code = Some("contract T {}".to_string());
        info.creator = Some("0xdeployer".to_string());
        info.age_in_days = 400;
        info.transaction_count = 100;
        info
    }

    fn run(info: &ContractInfo, analyzers: Vec<AnalyzerOutcome>, oracles: Vec<OracleContribution>) -> RiskRecord {
        aggregate(Aggregation {
            info,
            depth: ScanDepth::Quick,
            using_fallback: false,
            trace: vec!["try_primary: verified source from explorer".to_string()],
            scam_keyword: None,
            analyzers,
            oracles,
            analyzed_at: 1_700_000_000,
        })
    }

    #[test]
    fn test_weighted_sum_and_clamp() {
        assert_eq!(weighted_score(0, 0), 50.0);
        assert_eq!(weighted_score(50, 0), 70.0);
        assert_eq!(weighted_score(0, 50), 80.0);
        assert_eq!(weighted_score(500, 500), 100.0);
        assert_eq!(weighted_score(-500, 0), 0.0);
    }

    #[test]
    fn test_scam_name_short_circuits() {
        let mut info = verified(USDC);
        info.name = Some("HoneyPot Inu".to_string());
        let record = aggregate(Aggregation {
            info: &info,
            depth: ScanDepth::Deep,
            using_fallback: false,
            trace: vec![],
            scam_keyword: Some("honeypot"),
            analyzers: vec![outcome(AnalyzerCategory::Code, -100)],
            oracles: vec![],
            analyzed_at: 0,
        });
        assert_eq!(record.score, 95, "short-circuit wins over the safe-list cap");
        assert_eq!(record.level, RiskLevel::Critical);
        assert_eq!(record.findings.len(), 1);
        assert_eq!(record.findings[0].kind, FindingKind::ObviousScamName);
    }

    #[test]
    fn test_known_safe_cap() {
        let info = verified(USDC);
        let record = run(
            &info,
            vec![outcome(AnalyzerCategory::Ownership, 40)],
            vec![oracle(OracleStatus::Checked, true, 30)],
        );
        assert!(record.score <= 15);
        assert_eq!(record.level, RiskLevel::Low);
        assert_eq!(record.security_checks["known_safe_token"], true);
    }

    #[test]
    fn test_stablecoin_cap_requires_verification() {
        let mut info = verified(TOKEN);
        info.symbol = Some("USDX".to_string());
        let heavy = vec![outcome(AnalyzerCategory::Code, 60)];
        assert_eq!(run(&info, heavy.clone(), vec![]).score, 20);

        info.verified = false;
        assert_eq!(run(&info, heavy, vec![]).score, 74);
    }

    #[test]
    fn test_contract_not_found() {
        let info = ContractInfo::new(TOKEN, Chain::Ethereum);
        let record = run(&info, vec![], vec![]);
        let finding = record
            .findings
            .iter()
            .find(|f| f.kind == FindingKind::ContractNotFound)
            .unwrap();
        assert!(finding.score_delta >= 40);
        assert_eq!(record.score, 74);
    }

    #[test]
    fn test_unknown_to_databases_and_low_activity() {
        let mut info = verified(TOKEN);
        info.transaction_count = 3;
        let record = run(
            &info,
            vec![],
            vec![
                oracle(OracleStatus::NotFound, true, 0),
                oracle(OracleStatus::RateLimited, true, 0),
            ],
        );
        let kinds: Vec<FindingKind> = record.findings.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&FindingKind::NotInSecurityDatabases));
        assert!(kinds.contains(&FindingKind::LowActivity));
        // 50 + 0.6 * 25
        assert_eq!(record.score, 65);
    }

    #[test]
    fn test_one_database_hit_clears_unknown_flag() {
        let info = verified(TOKEN);
        let oracles = vec![
            oracle(OracleStatus::NotFound, true, 0),
            oracle(OracleStatus::Checked, true, -5),
        ];
        assert!(derived_findings(&info, &oracles).is_empty());
    }

    #[test]
    fn test_confidence_components() {
        let info = verified(TOKEN);
        let analyzers = vec![
            outcome(AnalyzerCategory::Code, 0),
            outcome(AnalyzerCategory::Ownership, 0),
            outcome(AnalyzerCategory::Liquidity, 0),
        ];
        let oracles = vec![oracle(OracleStatus::Checked, false, 0), oracle(OracleStatus::Checked, true, 0)];
        // 0.5 + 0.15 + 0.10 + 0.10 + 0.05 + 2 * 0.05
        assert_eq!(run(&info, analyzers, oracles).confidence, 1.0);

        let bare = ContractInfo::new(TOKEN, Chain::Ethereum);
        assert_eq!(run(&bare, vec![], vec![]).confidence, 0.5);
    }

    #[test]
    fn test_failed_analyzer_lowers_confidence() {
        let info = verified(TOKEN);
        let mut failed = outcome(AnalyzerCategory::Ownership, 0);
        failed.produced_data = false;
        let with_data = run(&info, vec![outcome(AnalyzerCategory::Ownership, 0)], vec![]).confidence;
        let without = run(&info, vec![failed], vec![]).confidence;
        assert!(without < with_data);
    }

    #[test]
    fn test_recommendations_order() {
        let info = verified(TOKEN);
        let record = aggregate(Aggregation {
            info: &info,
            depth: ScanDepth::Quick,
            using_fallback: true,
            trace: vec![],
            scam_keyword: None,
            analyzers: vec![outcome(AnalyzerCategory::Code, 20), outcome(AnalyzerCategory::Code, 20)],
            oracles: vec![],
            analyzed_at: 0,
        });
        assert_eq!(record.recommendations.len(), 3, "headline, one per kind, fallback caveat");
        assert!(record.recommendations[0].contains("RISK"));
        assert!(record.recommendations[2].contains("on-chain reads"));
        assert_eq!(record.analyzed_at, "1970-01-01T00:00:00+00:00");
    }
}
