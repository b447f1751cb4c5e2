//! Ruster Scan Library
//!
//! Smart contract risk scanner producing a 0-100 fraud score for EVM contracts:
//! - Source, ownership, behavior, liquidity, holder and bytecode analyzers
//! - Third-party security oracles (explorer, Sourcify, honeypot simulation,
//!   scam databases, creator history)
//! - Weighted aggregation with hard overrides and a TTL result cache

pub mod analyzers;
pub mod api;
pub mod core;
pub mod models;
pub mod oracles;
pub mod providers;
pub mod utils;

pub use crate::core::{BatchItem, Collaborators, Scanner};
pub use models::{AppError, AppResult, Chain, RiskLevel, RiskRecord, ScanConfig, ScanDepth};
pub use utils::{ResultCache, SystemClock};
