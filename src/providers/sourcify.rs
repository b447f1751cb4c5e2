//! Sourcify client (decentralized source verification)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Chain;
use crate::providers::http::{get_json, Fetched};

const SERVICE: &str = "sourcify";

/// Verification level in the Sourcify repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcifyMatch {
    /// Bytecode and metadata hash match
    Full,
    /// Bytecode matches, metadata differs
    Partial,
    /// Not in the repository
    Missing,
}

impl SourcifyMatch {
    fn from_status(status: &str) -> Self {
        match status {
            "perfect" | "full" => Self::Full,
            "partial" => Self::Partial,
            _ => Self::Missing,
        }
    }

    pub fn is_verified(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Source files recovered from Sourcify
#[derive(Debug, Clone, PartialEq)]
pub struct SourcifySource {
    /// All `.sol` files concatenated in repository order
    pub source_code: String,
    pub contract_name: Option<String>,
    pub level: SourcifyMatch,
}

#[async_trait]
pub trait SourcifyApi: Send + Sync {
    async fn check_match(&self, chain: Chain, address: &str) -> AppResult<SourcifyMatch>;

    /// `None` when Sourcify has no files for the address
    async fn source_files(&self, chain: Chain, address: &str) -> AppResult<Option<SourcifySource>>;
}

#[derive(Debug, Deserialize)]
struct CheckEntry {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "chainIds")]
    chain_ids: Option<Vec<ChainStatus>>,
}

/// Newer servers return objects, older ones bare chain id strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChainStatus {
    Detailed {
        #[serde(rename = "chainId")]
        chain_id: String,
        status: String,
    },
    Bare(String),
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    files: Vec<SourceFile>,
}

#[derive(Debug, Deserialize)]
struct SourceFile {
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Clone)]
pub struct SourcifyClient {
    client: reqwest::Client,
    base_url: String,
}

impl SourcifyClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn contract_name_from_metadata(metadata: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(metadata).ok()?;
    value
        .get("settings")?
        .get("compilationTarget")?
        .as_object()?
        .values()
        .next()?
        .as_str()
        .map(String::from)
}

#[async_trait]
impl SourcifyApi for SourcifyClient {
    async fn check_match(&self, chain: Chain, address: &str) -> AppResult<SourcifyMatch> {
        let url = format!("{}/check-by-addresses", self.base_url);
        let query = [
            ("addresses", address.to_string()),
            ("chainIds", chain.chain_id().to_string()),
        ];
        let entries: Vec<CheckEntry> = match get_json(&self.client, SERVICE, &url, &query).await? {
            Fetched::Found(entries) => entries,
            Fetched::NotFound => return Ok(SourcifyMatch::Missing),
            Fetched::RateLimited => return Err(AppError::rate_limited(SERVICE)),
        };

        let wanted = chain.chain_id().to_string();
        for entry in entries {
            if let Some(chain_ids) = entry.chain_ids {
                for item in chain_ids {
                    match item {
                        ChainStatus::Detailed { chain_id, status } if chain_id == wanted => {
                            return Ok(SourcifyMatch::from_status(&status));
                        }
                        ChainStatus::Bare(chain_id) if chain_id == wanted => {
                            return Ok(SourcifyMatch::from_status(
                                entry.status.as_deref().unwrap_or("perfect"),
                            ));
                        }
                        _ => {}
                    }
                }
            }
            if let Some(status) = entry.status {
                return Ok(SourcifyMatch::from_status(&status));
            }
        }
        Ok(SourcifyMatch::Missing)
    }

    async fn source_files(&self, chain: Chain, address: &str) -> AppResult<Option<SourcifySource>> {
        let url = format!("{}/files/any/{}/{}", self.base_url, chain.chain_id(), address);
        let response: FilesResponse = match get_json(&self.client, SERVICE, &url, &[]).await? {
            Fetched::Found(response) => response,
            Fetched::NotFound => return Ok(None),
            Fetched::RateLimited => return Err(AppError::rate_limited(SERVICE)),
        };

        let contract_name = response
            .files
            .iter()
            .find(|f| f.name == "metadata.json")
            .and_then(|f| contract_name_from_metadata(&f.content));

        let source_code = response
            .files
            .iter()
            .filter(|f| f.name.ends_with(".sol"))
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if source_code.trim().is_empty() {
            debug!(address, %chain, "Sourcify returned no Solidity files");
            return Ok(None);
        }

        Ok(Some(SourcifySource {
            source_code,
            contract_name,
            level: SourcifyMatch::from_status(&response.status),
        }))
    }
}
