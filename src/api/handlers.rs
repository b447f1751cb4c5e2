//! API Request Handlers

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
};
use futures_util::future::{join, join_all};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::types::*;
use crate::core::pipeline::{BatchItem, Scanner};
use crate::models::config::{ScanConfig, ServiceUrls};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, RiskRecord, ScanDepth};
use crate::providers::http::{build_client, probe};
use crate::utils::constants::{APP_NAME, APP_VERSION};

/// Upper bound for each reachability check on /health
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address regex");
}

pub type ApiFailure = (StatusCode, Json<ErrorResponse>);

/// Shared application state
pub struct AppState {
    pub scanner: Arc<Scanner>,
    /// Used only for health probes
    pub client: reqwest::Client,
    pub urls: ServiceUrls,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>, client: reqwest::Client, urls: ServiceUrls) -> Self {
        Self {
            scanner,
            client,
            urls,
            start_time: Instant::now(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> AppResult<Self> {
        let scanner = Arc::new(Scanner::from_config(config)?);
        let client = build_client(HEALTH_CHECK_TIMEOUT)?;
        Ok(Self::new(scanner, client, config.urls.clone()))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================
// Validation
// ============================================

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

fn check_address(address: &str, details: &mut Vec<FieldError>) {
    if !is_valid_address(address) {
        details.push(FieldError::new(
            "contract_address",
            "Must be a 0x-prefixed 40 character hex address",
        ));
    }
}

fn parse_chain(value: Option<&str>, details: &mut Vec<FieldError>) -> Chain {
    let Some(name) = value else {
        return Chain::default();
    };
    Chain::from_name(name).unwrap_or_else(|| {
        let supported: Vec<&str> = Chain::ALL.iter().map(|c| c.as_str()).collect();
        details.push(FieldError::new(
            "chain",
            format!("Unsupported chain '{}', expected one of: {}", name, supported.join(", ")),
        ));
        Chain::default()
    })
}

fn parse_depth(value: Option<&str>, details: &mut Vec<FieldError>) -> ScanDepth {
    let Some(name) = value else {
        return ScanDepth::default();
    };
    ScanDepth::from_name(name).unwrap_or_else(|| {
        details.push(FieldError::new(
            "scan_depth",
            format!("Invalid scan_depth '{}', expected quick or deep", name),
        ));
        ScanDepth::default()
    })
}

fn validation_failure(details: Vec<FieldError>) -> ApiFailure {
    warn!(fields = ?details.iter().map(|d| d.field.as_str()).collect::<Vec<_>>(), "Rejected request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(ApiError::validation(details))),
    )
}

fn body_failure(rejection: JsonRejection) -> ApiFailure {
    validation_failure(vec![FieldError::new("body", rejection.body_text())])
}

fn app_failure(err: &AppError) -> ApiFailure {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(code = err.code_str(), "❌ {}", err.message);
    }
    (status, Json(ErrorResponse::new(ApiError::from(err))))
}

// ============================================
// Contract Analysis
// ============================================

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<RiskRecord>, ApiFailure> {
    let Json(req) = payload.map_err(body_failure)?;

    let mut details = Vec::new();
    check_address(&req.contract_address, &mut details);
    let chain = parse_chain(req.chain.as_deref(), &mut details);
    let depth = parse_depth(req.scan_depth.as_deref(), &mut details);
    if !details.is_empty() {
        return Err(validation_failure(details));
    }

    state
        .scanner
        .analyze(&req.contract_address, chain, depth)
        .await
        .map(Json)
        .map_err(|e| app_failure(&e))
}

// ============================================
// Batch Analysis
// ============================================

pub async fn analyze_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchAnalyzeRequest>, JsonRejection>,
) -> Result<Json<BatchAnalyzeData>, ApiFailure> {
    let Json(req) = payload.map_err(body_failure)?;
    let max = state.scanner.max_batch_size();

    if req.contracts.len() > max {
        let err = AppError::batch_too_large(req.contracts.len(), max);
        warn!("🚫 {}", err.message);
        let mut body = ApiError::from(&err);
        body.details
            .push(FieldError::new("contracts", format!("At most {} contracts per batch", max)));
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(body))));
    }

    let mut details = Vec::new();
    if req.contracts.is_empty() {
        details.push(FieldError::new("contracts", "Must contain at least one address"));
    }
    let chain = parse_chain(req.chain.as_deref(), &mut details);
    let depth = parse_depth(req.scan_depth.as_deref(), &mut details);
    if !details.is_empty() {
        return Err(validation_failure(details));
    }

    // Malformed addresses fail individually without touching the pipeline
    let valid: Vec<String> = req
        .contracts
        .iter()
        .filter(|a| is_valid_address(a))
        .cloned()
        .collect();
    info!("📦 Batch of {} ({} valid) on {} ({} scan)", req.contracts.len(), valid.len(), chain, depth);

    let mut runs = state
        .scanner
        .analyze_batch(&valid, chain, depth)
        .await
        .map_err(|e| app_failure(&e))?
        .into_iter();

    let results: Vec<BatchResultItem> = req
        .contracts
        .into_iter()
        .map(|address| {
            if !is_valid_address(&address) {
                let mut details = Vec::new();
                check_address(&address, &mut details);
                return BatchResultItem::failed(address, ApiError::validation(details));
            }
            match runs.next() {
                Some(BatchItem {
                    address,
                    result: Ok(record),
                }) => BatchResultItem::ok(address, record),
                Some(BatchItem {
                    address,
                    result: Err(e),
                }) => {
                    warn!(%address, code = e.code_str(), "Batch item failed: {}", e.message);
                    BatchResultItem::failed(address, ApiError::from(&e))
                }
                None => BatchResultItem::failed(address, ApiError::internal("Missing batch result")),
            }
        })
        .collect();

    let successful = results.iter().filter(|r| r.success).count();
    Ok(Json(BatchAnalyzeData {
        batch_size: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    }))
}

// ============================================
// Health Check
// ============================================

async fn timed<F>(check: F) -> ServiceHealth
where
    F: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    let reachable = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check)
        .await
        .unwrap_or(false);
    ServiceHealth {
        reachable,
        latency_ms: start.elapsed().as_millis() as u64,
    }
}

/// 200 when the Ethereum RPC answers, 503 otherwise. REST upstreams are
/// reported but do not flip the status since every oracle degrades alone.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthData>) {
    let reader = state.scanner.reader().clone();
    let rpc = timed(async move { reader.block_number(Chain::Ethereum).await.is_ok() });

    let urls = &state.urls;
    let rest = [
        ("explorer", urls.explorer.as_str()),
        ("sourcify", urls.sourcify.as_str()),
        ("honeypot", urls.honeypot.as_str()),
        ("goplus", urls.goplus.as_str()),
        ("dexscreener", urls.dexscreener.as_str()),
    ];
    let probes = rest.into_iter().map(|(name, url)| {
        let client = &state.client;
        async move { (name, timed(probe(client, url)).await) }
    });

    let (rpc, probed) = join(rpc, join_all(probes)).await;
    let healthy = rpc.reachable;

    let mut services: BTreeMap<String, ServiceHealth> = probed
        .into_iter()
        .map(|(name, health)| (name.to_string(), health))
        .collect();
    services.insert("rpc_ethereum".to_string(), rpc);

    if !healthy {
        warn!("⚠️ Health degraded: Ethereum RPC unreachable");
    }

    let data = HealthData {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        services,
        cache: state.scanner.cache().stats(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(data))
}

// ============================================
// Service Metadata
// ============================================

pub async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: APP_NAME.to_string(),
        version: APP_VERSION.to_string(),
        description: "Smart contract risk scanner: source, ownership, liquidity and behavior analysis \
                      combined with third-party security oracles"
            .to_string(),
        endpoints: vec![
            EndpointInfo {
                method: "POST",
                path: "/analyze",
                description: "Risk analysis of one contract",
            },
            EndpointInfo {
                method: "POST",
                path: "/analyze-batch",
                description: "Risk analysis of up to max_batch_size contracts",
            },
            EndpointInfo {
                method: "GET",
                path: "/health",
                description: "Upstream reachability and cache statistics",
            },
        ],
        supported_chains: Chain::ALL.iter().map(|c| c.as_str()).collect(),
        scan_depths: vec![ScanDepth::Quick.as_str(), ScanDepth::Deep.as_str()],
        max_batch_size: state.scanner.max_batch_size(),
    })
}
