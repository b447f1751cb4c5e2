//! End-to-end pipeline tests against in-process upstreams

mod common;

use common::*;
use std::collections::BTreeSet;
use std::time::Duration;

use ruster_scan::models::errors::ErrorCode;
use ruster_scan::models::types::FindingKind;
use ruster_scan::{Chain, RiskLevel, RiskRecord, ScanDepth};

/// Analyzers and oracles that left at least one finding
fn sources(record: &RiskRecord) -> BTreeSet<&str> {
    record.findings.iter().map(|f| f.source.as_str()).collect()
}

fn assert_ran(record: &RiskRecord, ran: &[&str], skipped: &[&str]) {
    let seen = sources(record);
    for name in ran {
        assert!(seen.contains(name), "{} should have run, saw {:?}", name, seen);
    }
    for name in skipped {
        assert!(!seen.contains(name), "{} should have been skipped, saw {:?}", name, seen);
    }
}

#[tokio::test]
async fn test_plain_verified_token() {
    let h = harness(Profile::plain(TOKEN));
    let record = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();

    // 50 + 0.6 * (-5 from explorer verification)
    assert_eq!(record.score, 47);
    assert_eq!(record.level, RiskLevel::Medium);
    assert_eq!(record.confidence, 0.9);
    assert!(!record.using_fallback);
    assert_eq!(record.security_checks["source_verified"], true);
    assert_eq!(record.security_checks["scam_database_clean"], true);
    assert_eq!(record.token_symbol.as_deref(), Some("PLN"));
    assert_eq!(record.resolution_trace.len(), 1);
    assert_eq!(record.analyzed_at, "2023-11-14T22:13:20+00:00");
}

#[tokio::test]
async fn test_cache_serves_identical_record_until_ttl() {
    let h = harness(Profile::plain(TOKEN));
    let first = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    let calls = h.explorer.calls();

    h.clock.advance(TTL);
    let second = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(h.explorer.calls(), calls, "served from cache");

    h.clock.advance(1);
    let third = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert!(h.explorer.calls() > calls, "recomputed after expiry");
    assert_ne!(third.analyzed_at, first.analyzed_at);
    assert_eq!(third.score, first.score);
}

#[tokio::test]
async fn test_depth_is_part_of_the_cache_key() {
    let h = harness(Profile::plain(TOKEN));
    h.scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    let calls = h.explorer.calls();
    let deep = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();
    assert!(h.explorer.calls() > calls);
    assert_eq!(deep.scan_depth, ScanDepth::Deep);
}

#[tokio::test]
async fn test_usdc_is_capped_low() {
    let mut profile = Profile::plain(USDC);
    profile.name = Some("USD Coin".to_string());
    profile.symbol = Some("USDC".to_string());
    profile.owner = Some(EOA.to_string());

    let record = harness(profile)
        .scanner
        .analyze(USDC, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert!(record.score <= 15, "score {}", record.score);
    assert_eq!(record.level, RiskLevel::Low);
    assert_eq!(record.security_checks["known_safe_token"], true);
}

#[tokio::test]
async fn test_scam_name_short_circuits_checks() {
    let mut profile = Profile::plain(TOKEN);
    profile.name = Some("Honeypot Finance".to_string());
    let h = harness(profile);

    let record = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();
    assert_eq!(record.score, 95);
    assert_eq!(record.level, RiskLevel::Critical);
    assert!(record
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::ObviousScamName));
    // Only the resolver looked the source up; oracles never ran
    assert_eq!(h.explorer.calls(), 1);
}

#[tokio::test]
async fn test_unknown_address_is_flagged() {
    let record = harness(Profile::unknown(TOKEN))
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    let finding = record
        .findings
        .iter()
        .find(|f| f.kind == FindingKind::ContractNotFound)
        .expect("contract_not_found finding");
    assert!(finding.score_delta >= 40);
    // 50 + 0.6 * (15 unverified + 40 not found)
    assert_eq!(record.score, 83);
    assert_eq!(record.level, RiskLevel::Critical);
}

#[tokio::test]
async fn test_analyzer_timeout_still_yields_record() {
    let timeout = Duration::from_millis(200);
    let fast = harness_with_timeout(Profile::plain(TOKEN), timeout)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();

    let mut slow_profile = Profile::plain(TOKEN);
    slow_profile.owner_delay = Some(Duration::from_secs(5));
    let slow = harness_with_timeout(slow_profile, timeout)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();

    assert!(slow
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::AnalyzerUnavailable && f.source == "ownership"));
    assert!(slow.confidence < fast.confidence);
    assert_eq!(slow.score, fast.score);
}

#[tokio::test]
async fn test_fallback_when_sources_unavailable() {
    let mut profile = Profile::unknown(TOKEN);
    profile.explorer_down = true;
    profile.tx_count = 12;

    let record = harness(profile)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert!(record.using_fallback);
    assert_eq!(record.security_checks["fallback_mode"], true);
    assert_eq!(record.resolution_trace.len(), 3);
    assert!(record
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::FallbackMode));
    assert!(record
        .recommendations
        .last()
        .unwrap()
        .contains("on-chain reads"));
}

#[tokio::test]
async fn test_batch_limit_runs_nothing() {
    let h = harness(Profile::plain(TOKEN));
    let addresses = vec![TOKEN.to_string(); 11];
    let err = h
        .scanner
        .analyze_batch(&addresses, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationBatchTooLarge);
    assert_eq!(h.explorer.calls(), 0);
}

#[tokio::test]
async fn test_batch_collects_each_result() {
    let h = harness(Profile::plain(TOKEN));
    let addresses = vec![TOKEN.to_string(), USDC.to_string()];
    let items = h
        .scanner
        .analyze_batch(&addresses, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].address, TOKEN);
    for item in &items {
        let record = item.result.as_ref().unwrap();
        assert!(record.score <= 100);
        assert!((0.0..=1.0).contains(&record.confidence));
    }
}

#[tokio::test]
async fn test_quick_scan_skips_deep_checks() {
    let mut profile = Profile::plain(TOKEN);
    profile.failed_txs = 30;

    let record = harness(profile)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Quick)
        .await
        .unwrap();
    assert_ran(
        &record,
        &["ownership", "behavior", "explorer_verification", "clean_db"],
        &["liquidity", "holders", "creator_history", "bytecode"],
    );
}

#[tokio::test]
async fn test_deep_scan_runs_deep_checks() {
    let mut profile = Profile::plain(TOKEN);
    profile.failed_txs = 30;

    let record = harness(profile)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();
    assert_ran(
        &record,
        &["ownership", "behavior", "liquidity", "holders", "creator_history"],
        &["bytecode"],
    );
    assert!(record
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::NoLiquidity && f.source == "liquidity"));
    assert!(record
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::CreatorClean && f.source == "creator_history"));
}

#[tokio::test]
async fn test_fallback_runs_bytecode_heuristics_only() {
    let mut profile = Profile::unknown(TOKEN);
    profile.explorer_down = true;
    profile.tx_count = 12;
    // ...PUSH1 0x80 PUSH1 0x40 MSTORE SELFDESTRUCT
    profile.bytecode = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0xff];

    let record = harness(profile)
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();
    assert!(record.using_fallback);
    assert_ran(
        &record,
        &["bytecode"],
        &["ownership", "behavior", "source_patterns"],
    );
    let opcode = record
        .findings
        .iter()
        .find(|f| f.kind == FindingKind::BytecodeOpcode)
        .expect("opcode finding");
    assert_eq!(opcode.score_delta, 0);
}

#[tokio::test]
async fn test_deep_record_is_served_byte_identical() {
    let mut profile = Profile::plain(TOKEN);
    profile.failed_txs = 30;
    let h = harness(profile);

    let first = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();
    let calls = h.explorer.calls();
    h.clock.advance(TTL / 2);
    let second = h
        .scanner
        .analyze(TOKEN, Chain::Ethereum, ScanDepth::Deep)
        .await
        .unwrap();

    assert_eq!(h.explorer.calls(), calls, "served from cache");
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
