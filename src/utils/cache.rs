//! Result Cache Module
//!
//! Thread-safe, time-bounded store for finished risk records.
//! Uses DashMap for concurrent access without a global lock.
//!
//! Features:
//! - Key: (lower-cased address, chain, scan depth)
//! - Records stored as serialized JSON, parsed on read
//! - TTL enforced lazily on read; `cleanup_expired` for eager sweeps
//! - Injectable clock so expiry can be driven from tests
//!
//! There is no in-flight deduplication: two concurrent misses for the same
//! key both run the pipeline and the last `set` wins.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::errors::AppError;
use crate::models::types::{Chain, RiskRecord, ScanDepth};
use crate::utils::constants::DEFAULT_CACHE_TTL_SECS;

/// Time source in unix seconds
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(start_secs),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub chain: Chain,
    pub depth: ScanDepth,
}

impl CacheKey {
    pub fn new(address: &str, chain: Chain, depth: ScanDepth) -> Self {
        Self {
            address: address.to_lowercase(),
            chain,
            depth,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.chain, self.address, self.depth)
    }
}

/// Stored payload with its write timestamp
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub payload: String,
    pub stored_at: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: u64, ttl_secs: u64) -> bool {
        now.saturating_sub(self.stored_at) > ttl_secs
    }
}

/// Time-bounded result cache
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL_SECS)
    }
}

impl ResultCache {
    /// Cache on the wall clock
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl_secs,
            clock,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the record if present, unexpired and parseable
    pub fn get(&self, key: &CacheKey) -> Option<RiskRecord> {
        let now = self.clock.now_secs();

        let entry = match self.store.get(key) {
            Some(entry) => entry.clone(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS: {}", key);
                return None;
            }
        };

        if entry.is_expired(now, self.ttl_secs) {
            self.store.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("📭 CACHE MISS (expired): {}", key);
            return None;
        }

        match serde_json::from_str::<RiskRecord>(&entry.payload) {
            Ok(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let remaining = self.ttl_secs.saturating_sub(now.saturating_sub(entry.stored_at));
                info!("✅ CACHE HIT: {} (TTL: {}s remaining)", key, remaining);
                Some(record)
            }
            Err(e) => {
                let err = AppError::cache_corruption(e);
                warn!(key = %key, error = %err, "Dropping corrupted cache entry");
                self.store.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Upsert; last writer wins
    pub fn set(&self, key: CacheKey, record: &RiskRecord) {
        match serde_json::to_string(record) {
            Ok(payload) => self.set_raw(key, payload),
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize record for cache"),
        }
    }

    /// Store an already-serialized payload
    pub fn set_raw(&self, key: CacheKey, payload: String) {
        let entry = CacheEntry {
            payload,
            stored_at: self.clock.now_secs(),
        };
        info!("💾 CACHE SET: {} (TTL: {}s)", key, self.ttl_secs);
        self.store.insert(key, entry);
    }

    /// Remove every expired entry
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_secs();
        let ttl = self.ttl_secs;
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired(now, ttl));
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get statistik cache
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl_secs,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{Finding, FindingKind, RiskLevel, Severity};
    use std::collections::BTreeMap;

    fn mock_record(address: &str) -> RiskRecord {
        RiskRecord {
            address: address.to_lowercase(),
            chain: Chain::Ethereum,
            scan_depth: ScanDepth::Quick,
            score: 42,
            level: RiskLevel::Medium,
            confidence: 0.65,
            contract_name: None,
            token_name: Some("Token".to_string()),
            token_symbol: Some("TKN".to_string()),
            using_fallback: false,
            resolution_trace: vec!["try_primary".to_string()],
            findings: vec![],
            security_checks: BTreeMap::new(),
            recommendations: vec![],
            analyzed_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn cache_at(start: u64) -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (ResultCache::with_clock(3600, clock.clone()), clock)
    }

    #[test]
    fn test_cache_set_get() {
        let (cache, _) = cache_at(1_000);
        let key = CacheKey::new("0xdAC17F958D2ee523a2206206994597C13D831ec7", Chain::Ethereum, ScanDepth::Quick);
        cache.set(key.clone(), &mock_record("0xdAC17F958D2ee523a2206206994597C13D831ec7"));
        assert_eq!(cache.get(&key).map(|r| r.score), Some(42));
    }

    #[test]
    fn test_address_normalization() {
        let (cache, _) = cache_at(1_000);
        let upper = CacheKey::new("0xDAC17F958D2EE523A2206206994597C13D831EC7", Chain::Ethereum, ScanDepth::Quick);
        let lower = CacheKey::new("0xdac17f958d2ee523a2206206994597c13d831ec7", Chain::Ethereum, ScanDepth::Quick);
        cache.set(upper, &mock_record("0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(cache.get(&lower).is_some());
    }

    #[test]
    fn test_depth_and_chain_are_part_of_key() {
        let (cache, _) = cache_at(1_000);
        let address = "0x1234567890123456789012345678901234567890";
        cache.set(CacheKey::new(address, Chain::Ethereum, ScanDepth::Quick), &mock_record(address));
        assert!(cache.get(&CacheKey::new(address, Chain::Ethereum, ScanDepth::Deep)).is_none());
        assert!(cache.get(&CacheKey::new(address, Chain::Base, ScanDepth::Quick)).is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let (cache, clock) = cache_at(10_000);
        let address = "0x1234567890123456789012345678901234567890";
        let key = CacheKey::new(address, Chain::Ethereum, ScanDepth::Quick);
        cache.set(key.clone(), &mock_record(address));

        clock.advance(3600);
        assert!(cache.get(&key).is_some(), "exactly TTL is still fresh");

        clock.advance(1);
        assert!(cache.get(&key).is_none(), "TTL + 1 is expired");
        assert!(cache.is_empty(), "expired entry is removed on read");
    }

    #[test]
    fn test_corrupted_payload_is_a_miss() {
        let (cache, _) = cache_at(1_000);
        let key = CacheKey::new("0xabc", Chain::Ethereum, ScanDepth::Quick);
        cache.set_raw(key.clone(), "{not json".to_string());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let (cache, clock) = cache_at(0);
        cache.set(CacheKey::new("0xa", Chain::Ethereum, ScanDepth::Quick), &mock_record("0xa"));
        clock.advance(4000);
        cache.set(CacheKey::new("0xb", Chain::Ethereum, ScanDepth::Quick), &mock_record("0xb"));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_stats() {
        let (cache, _) = cache_at(0);
        let key = CacheKey::new("0xtest", Chain::Ethereum, ScanDepth::Quick);
        cache.set(key.clone(), &mock_record("0xtest"));
        cache.get(&key);
        cache.get(&CacheKey::new("0xnonexistent", Chain::Ethereum, ScanDepth::Quick));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cached_float_evidence_is_byte_identical() {
        let (cache, _) = cache_at(1_000);
        let mut mismatches = Vec::new();
        for a in 0..100u32 {
            for b in 0..100u32 {
                let top = a as f64 / 100.0 + b as f64 / 100.0;
                let mut record = mock_record("0xfloat");
                record.findings.push(
                    Finding::new(FindingKind::HolderConcentration, Severity::Medium, "Top holders", 10, "holders")
                        .with_evidence(serde_json::json!({ "top_holders_percent": top })),
                );
                let key = CacheKey::new("0xfloat", Chain::Ethereum, ScanDepth::Deep);
                cache.set(key.clone(), &record);

                let fresh = serde_json::to_string(&record).unwrap();
                let cached = serde_json::to_string(&cache.get(&key).unwrap()).unwrap();
                if fresh != cached {
                    mismatches.push((fresh, cached));
                }
            }
        }
        assert!(mismatches.is_empty(), "first mismatch: {:?}", mismatches.first());
    }
}
