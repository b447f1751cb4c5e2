//! API Request/Response Types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::errors::{AppError, ErrorCode};
use crate::models::types::RiskRecord;
use crate::utils::cache::CacheStats;

/// Error body returned for every non-2xx answer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
    pub timestamp: i64,
}

impl ErrorResponse {
    pub fn new(error: ApiError) -> Self {
        Self {
            success: false,
            error,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Field-level problems, empty for non-validation errors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl ApiError {
    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            code: ErrorCode::ValidationBadRequest.as_str().to_string(),
            message: "Request validation failed".to_string(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError.as_str().to_string(),
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: Vec::new(),
        }
    }
}

// ============================================
// Analysis
// ============================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub contract_address: String,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub scan_depth: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchAnalyzeRequest {
    pub contracts: Vec<String>,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub scan_depth: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchAnalyzeData {
    pub batch_size: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchResultItem>,
}

/// One contract of a batch: either a record or the error it produced
#[derive(Debug, Serialize)]
pub struct BatchResultItem {
    pub contract_address: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RiskRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl BatchResultItem {
    pub fn ok(contract_address: String, record: RiskRecord) -> Self {
        Self {
            contract_address,
            success: true,
            result: Some(record),
            error: None,
        }
    }

    pub fn failed(contract_address: String, error: ApiError) -> Self {
        Self {
            contract_address,
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

// ============================================
// Health & Metadata
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    /// "healthy" or "degraded"
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub services: BTreeMap<String, ServiceHealth>,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub reachable: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
    pub supported_chains: Vec<&'static str>,
    pub scan_depths: Vec<&'static str>,
    pub max_batch_size: usize,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}
