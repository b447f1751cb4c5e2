//! Analysis pipeline
//!
//! cache lookup → resolve → analyzers and oracles concurrently → aggregate → cache.
//! Every collaborator is built once and injected; nothing here is global.

use futures_util::future::{join, join_all};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::aggregator::{aggregate, token_labels, Aggregation};
use super::resolver::Resolver;
use crate::analyzers::{
    run_guarded, AnalysisContext, Analyzer, AnalyzerOutcome, BehaviorAnalyzer, BytecodeAnalyzer,
    HolderAnalyzer, LiquidityAnalyzer, OwnershipAnalyzer, SourcePatternAnalyzer,
};
use crate::models::config::ScanConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Chain, ContractInfo, RiskRecord, ScanDepth};
use crate::oracles::{
    CreatorHistoryOracle, ExplorerVerificationOracle, HoneypotOracle, OracleAdapter,
    OracleContribution, ScamDatabaseOracle, SourcifyOracle,
};
use crate::providers::dexscreener::{DexScreenerClient, PairSource};
use crate::providers::explorer::{EtherscanClient, ExplorerApi};
use crate::providers::http::build_client;
use crate::providers::rpc::{ChainReader, RpcManager};
use crate::providers::sourcify::{SourcifyApi, SourcifyClient};
use crate::utils::cache::{CacheKey, Clock, ResultCache, SystemClock};
use crate::utils::constants::find_scam_keyword;

/// External collaborators of the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub explorer: Arc<dyn ExplorerApi>,
    pub sourcify: Arc<dyn SourcifyApi>,
    pub reader: Arc<dyn ChainReader>,
    pub pairs: Arc<dyn PairSource>,
    pub clock: Arc<dyn Clock>,
    /// Honeypot simulation and scam-database oracles
    pub databases: Vec<Arc<dyn OracleAdapter>>,
}

impl Collaborators {
    /// Real clients for every upstream in the config
    pub fn from_config(config: &ScanConfig) -> AppResult<Self> {
        let client = build_client(config.request_timeout)?;

        let databases: Vec<Arc<dyn OracleAdapter>> = vec![
            Arc::new(HoneypotOracle::new(client.clone(), config.urls.honeypot.clone())),
            Arc::new(ScamDatabaseOracle::new(client.clone(), config.urls.goplus.clone())),
        ];

        Ok(Self {
            explorer: Arc::new(EtherscanClient::new(
                client.clone(),
                config.urls.explorer.clone(),
                config.explorer_api_key.clone(),
            )),
            sourcify: Arc::new(SourcifyClient::new(client.clone(), config.urls.sourcify.clone())),
            reader: Arc::new(RpcManager::from_config(config, client.clone())),
            pairs: Arc::new(DexScreenerClient::new(client, config.urls.dexscreener.clone())),
            clock: Arc::new(SystemClock),
            databases,
        })
    }
}

/// One entry of a batch run
#[derive(Debug)]
pub struct BatchItem {
    pub address: String,
    pub result: AppResult<RiskRecord>,
}

pub struct Scanner {
    resolver: Resolver,
    analyzers: Vec<Box<dyn Analyzer>>,
    oracles: Vec<Arc<dyn OracleAdapter>>,
    reader: Arc<dyn ChainReader>,
    cache: Arc<ResultCache>,
    clock: Arc<dyn Clock>,
    analyzer_timeout: Duration,
    max_batch_size: usize,
}

impl Scanner {
    pub fn new(
        parts: Collaborators,
        cache: Arc<ResultCache>,
        analyzer_timeout: Duration,
        max_batch_size: usize,
    ) -> Self {
        let Collaborators {
            explorer,
            sourcify,
            reader,
            pairs,
            clock,
            databases,
        } = parts;

        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(SourcePatternAnalyzer),
            Box::new(OwnershipAnalyzer::new(reader.clone())),
            Box::new(BehaviorAnalyzer::new(explorer.clone(), clock.clone())),
            Box::new(LiquidityAnalyzer::new(pairs.clone(), reader.clone())),
            Box::new(HolderAnalyzer::new(explorer.clone(), pairs, reader.clone())),
            Box::new(BytecodeAnalyzer::new(reader.clone())),
        ];

        let mut oracles: Vec<Arc<dyn OracleAdapter>> = vec![
            Arc::new(ExplorerVerificationOracle::new(explorer.clone())),
            Arc::new(SourcifyOracle::new(sourcify.clone())),
            Arc::new(CreatorHistoryOracle::new(explorer.clone(), clock.clone())),
        ];
        oracles.extend(databases);

        Self {
            resolver: Resolver::new(explorer, sourcify, reader.clone(), clock.clone()),
            analyzers,
            oracles,
            reader,
            cache,
            clock,
            analyzer_timeout,
            max_batch_size,
        }
    }

    /// Production scanner: real clients, wall clock, cache with the configured TTL
    pub fn from_config(config: &ScanConfig) -> AppResult<Self> {
        let parts = Collaborators::from_config(config)?;
        let cache = Arc::new(ResultCache::with_clock(config.cache_ttl_secs, parts.clock.clone()));
        Ok(Self::new(parts, cache, config.analyzer_timeout, config.max_batch_size))
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn reader(&self) -> &Arc<dyn ChainReader> {
        &self.reader
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Analyze one contract, serving from cache when fresh
    pub async fn analyze(&self, address: &str, chain: Chain, depth: ScanDepth) -> AppResult<RiskRecord> {
        let key = CacheKey::new(address, chain, depth);
        if let Some(record) = self.cache.get(&key) {
            info!("📦 Cache hit for {}", key);
            return Ok(record);
        }

        let started = Instant::now();
        info!("🔍 Analyzing {} on {} ({} scan)", address, chain, depth);

        let resolution = self.resolver.resolve(address, chain).await?;
        let info = &resolution.info;

        let scam_keyword = find_scam_keyword(token_labels(info));
        let (analyzers, oracles) = match scam_keyword {
            Some(keyword) => {
                warn!("🚨 {} carries scam keyword \"{}\", skipping checks", info.address, keyword);
                (Vec::new(), Vec::new())
            }
            None => {
                let ctx = AnalysisContext {
                    info,
                    depth,
                    using_fallback: resolution.using_fallback,
                };
                join(self.run_analyzers(&ctx), self.run_oracles(info, depth)).await
            }
        };

        let record = aggregate(Aggregation {
            info,
            depth,
            using_fallback: resolution.using_fallback,
            trace: resolution.trace.clone(),
            scam_keyword,
            analyzers,
            oracles,
            analyzed_at: self.clock.now_secs(),
        });

        info!(
            "📊 {} score={} level={} confidence={:.2} ({}ms)",
            record.address,
            record.score,
            record.level.as_str(),
            record.confidence,
            started.elapsed().as_millis()
        );

        self.cache.set(key, &record);
        Ok(record)
    }

    /// Analyze up to `max_batch_size` contracts concurrently
    pub async fn analyze_batch(
        &self,
        addresses: &[String],
        chain: Chain,
        depth: ScanDepth,
    ) -> AppResult<Vec<BatchItem>> {
        if addresses.len() > self.max_batch_size {
            return Err(AppError::batch_too_large(addresses.len(), self.max_batch_size));
        }

        let runs = addresses.iter().map(|address| async move {
            BatchItem {
                address: address.clone(),
                result: self.analyze(address, chain, depth).await,
            }
        });
        Ok(join_all(runs).await)
    }

    async fn run_analyzers(&self, ctx: &AnalysisContext<'_>) -> Vec<AnalyzerOutcome> {
        let selected: Vec<&dyn Analyzer> = self
            .analyzers
            .iter()
            .map(|a| a.as_ref())
            .filter(|a| a.should_run(ctx))
            .collect();
        debug!(
            analyzers = ?selected.iter().map(|a| a.name()).collect::<Vec<_>>(),
            "Selected analyzers"
        );

        join_all(
            selected
                .into_iter()
                .map(|a| run_guarded(a, ctx.info, self.analyzer_timeout)),
        )
        .await
    }

    async fn run_oracles(&self, info: &ContractInfo, depth: ScanDepth) -> Vec<OracleContribution> {
        let timeout = self.analyzer_timeout;
        let runs = self
            .oracles
            .iter()
            .filter(|o| o.runs_at(depth))
            .map(|oracle| async move {
                match tokio::time::timeout(timeout, oracle.evaluate(info)).await {
                    Ok(contribution) => contribution,
                    Err(_) => {
                        warn!(oracle = oracle.name(), "⏱️ Oracle timed out");
                        OracleContribution::timed_out(oracle.name(), oracle.is_security_database(), timeout.as_secs())
                    }
                }
            });
        join_all(runs).await
    }
}
