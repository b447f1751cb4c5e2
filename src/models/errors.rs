//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so it can be grepped in logs.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - VALIDATION_xxx: request rejected before the pipeline runs
//! - UPSTREAM_xxx: explorer/oracle/RPC failures (recovered locally)
//! - RESOLUTION_xxx: no data source could describe the contract (fatal per contract)
//! - CACHE_xxx: cache payload problems (treated as a miss)

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Validation Errors
    // ============================================
    /// Malformed contract address
    ValidationInvalidAddress,
    /// Unknown chain name
    ValidationUnsupportedChain,
    /// Unknown scan depth
    ValidationInvalidDepth,
    /// Batch larger than the configured maximum
    ValidationBatchTooLarge,
    /// Empty batch or otherwise malformed body
    ValidationBadRequest,

    // ============================================
    // Upstream Errors
    // ============================================
    /// Explorer/oracle/RPC unreachable or returned an error
    UpstreamUnavailable,
    /// Upstream call exceeded its timeout
    UpstreamTimeout,
    /// Upstream reported a rate limit (HTTP 429 or equivalent body)
    UpstreamRateLimited,
    /// Upstream answered with something we could not parse
    UpstreamInvalidResponse,
    /// Upstream has no record of the requested resource
    UpstreamNotFound,

    // ============================================
    // Pipeline Errors
    // ============================================
    /// Every data source failed to describe the contract
    ResolutionFailure,
    /// Stored cache payload failed to parse
    CacheCorruption,
    /// Anything else inside the pipeline
    InternalError,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationInvalidAddress => "VALIDATION_INVALID_ADDRESS",
            Self::ValidationUnsupportedChain => "VALIDATION_UNSUPPORTED_CHAIN",
            Self::ValidationInvalidDepth => "VALIDATION_INVALID_DEPTH",
            Self::ValidationBatchTooLarge => "VALIDATION_BATCH_TOO_LARGE",
            Self::ValidationBadRequest => "VALIDATION_BAD_REQUEST",

            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            Self::UpstreamInvalidResponse => "UPSTREAM_INVALID_RESPONSE",
            Self::UpstreamNotFound => "UPSTREAM_NOT_FOUND",

            Self::ResolutionFailure => "RESOLUTION_FAILURE",
            Self::CacheCorruption => "CACHE_CORRUPTION",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationInvalidAddress
            | Self::ValidationUnsupportedChain
            | Self::ValidationInvalidDepth
            | Self::ValidationBatchTooLarge
            | Self::ValidationBadRequest => 400,
            _ => 500,
        }
    }

    /// Only validation and resolution failures reach the caller
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResolutionFailure) || self.http_status() == 400
    }

    /// Check if error is worth retrying against the same upstream
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable | Self::UpstreamTimeout | Self::UpstreamRateLimited
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationInvalidAddress, msg)
    }

    pub fn unsupported_chain(chain: &str) -> Self {
        Self::new(
            ErrorCode::ValidationUnsupportedChain,
            format!("Unsupported chain: {}", chain),
        )
    }

    pub fn invalid_depth(depth: &str) -> Self {
        Self::new(
            ErrorCode::ValidationInvalidDepth,
            format!("Invalid scan_depth: {}", depth),
        )
    }

    pub fn batch_too_large(size: usize, max: usize) -> Self {
        Self::new(
            ErrorCode::ValidationBatchTooLarge,
            format!("Batch too large: {} contracts (max {})", size, max),
        )
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, msg)
    }

    pub fn upstream_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamTimeout, msg)
    }

    pub fn rate_limited(service: &str) -> Self {
        Self::new(
            ErrorCode::UpstreamRateLimited,
            format!("{} rate limited (HTTP 429)", service),
        )
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamNotFound, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamInvalidResponse, msg)
    }

    pub fn resolution_failure(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResolutionFailure, msg)
    }

    pub fn cache_corruption(source: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::CacheCorruption, "Cached record failed to parse", source)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::UpstreamTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::UpstreamUnavailable, "Connection failed")
        } else if err.is_decode() {
            Self::new(ErrorCode::UpstreamInvalidResponse, err.to_string())
        } else {
            Self::new(ErrorCode::UpstreamUnavailable, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::UpstreamInvalidResponse, "JSON parse error", err)
    }
}
