//! Block explorer client (Etherscan API v2, one endpoint for every chain)
//!
//! Etherscan answers HTTP 200 for almost everything and signals problems in
//! the envelope: `status: "0"` with a message such as `NOTOK` and a
//! human-readable `result`. Empty lists come back as `status: "0"` with
//! "No transactions found", which is not an error.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Chain;
use crate::providers::http::{get_json, Fetched};

const SERVICE: &str = "explorer";

/// Verified source as reported by the explorer
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerSource {
    pub source_code: String,
    pub contract_name: Option<String>,
    pub is_proxy: bool,
    pub implementation: Option<String>,
}

/// Deployment record
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCreation {
    pub creator: String,
    pub tx_hash: String,
    /// Unix seconds, when the explorer reports it
    pub timestamp: Option<u64>,
}

/// Normal transaction from `txlist`
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerTx {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub timestamp: u64,
    pub is_error: bool,
    /// e.g. `setFee(uint256 fee)`, empty for plain transfers
    pub function_name: String,
    /// Non-empty for contract creations
    pub contract_address: String,
}

impl ExplorerTx {
    pub fn is_deployment(&self) -> bool {
        self.to.is_empty() && !self.contract_address.is_empty()
    }
}

/// Entry of `tokenholderlist`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolder {
    pub address: String,
    /// Raw integer balance as a decimal string
    pub quantity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Explorer operations used by the resolver, analyzers and oracles
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    /// `None` when the explorer reports the contract as not verified
    async fn source_code(&self, chain: Chain, address: &str) -> AppResult<Option<ExplorerSource>>;

    async fn contract_creation(&self, chain: Chain, address: &str) -> AppResult<Option<ContractCreation>>;

    async fn transactions(
        &self,
        chain: Chain,
        address: &str,
        limit: usize,
        order: SortOrder,
    ) -> AppResult<Vec<ExplorerTx>>;

    async fn token_holders(&self, chain: Chain, token: &str, limit: usize) -> AppResult<Vec<TokenHolder>>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct RawSource {
    source_code: String,
    contract_name: String,
    proxy: String,
    implementation: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawCreation {
    contract_creator: String,
    tx_hash: String,
    timestamp: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTx {
    hash: String,
    from: String,
    to: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
    #[serde(rename = "isError")]
    is_error: String,
    #[serde(rename = "functionName")]
    function_name: String,
    #[serde(rename = "contractAddress")]
    contract_address: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawHolder {
    #[serde(rename = "TokenHolderAddress")]
    address: String,
    #[serde(rename = "TokenHolderQuantity")]
    quantity: String,
}

/// Etherscan v2 client
#[derive(Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EtherscanClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Call one module/action and decode the `result` field
    async fn query<T: DeserializeOwned + Default>(
        &self,
        chain: Chain,
        module: &str,
        action: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let mut query: Vec<(&str, String)> = vec![
            ("chainid", chain.chain_id().to_string()),
            ("module", module.to_string()),
            ("action", action.to_string()),
        ];
        query.extend(params.iter().cloned());
        if let Some(ref key) = self.api_key {
            query.push(("apikey", key.clone()));
        }

        let envelope: Envelope = match get_json(&self.client, SERVICE, &self.base_url, &query).await? {
            Fetched::Found(envelope) => envelope,
            Fetched::NotFound => return Err(AppError::not_found(format!("{} {}", module, action))),
            Fetched::RateLimited => return Err(AppError::rate_limited(SERVICE)),
        };

        interpret(envelope, module, action)
    }
}

/// Turn an Etherscan envelope into a typed result or a classified error
fn interpret<T: DeserializeOwned + Default>(envelope: Envelope, module: &str, action: &str) -> AppResult<T> {
    let result_text = envelope.result.as_str().unwrap_or_default().to_lowercase();

    if envelope.status == "0" {
        let message = envelope.message.to_lowercase();
        if message.contains("no transactions found") || message.contains("no records found") {
            return Ok(T::default());
        }
        if result_text.contains("rate limit") || message.contains("rate limit") {
            return Err(AppError::rate_limited(SERVICE));
        }
        if envelope.result.as_array().map(|a| a.is_empty()).unwrap_or(false) {
            return Ok(T::default());
        }
        warn!(module, action, message = %envelope.message, "Explorer returned NOTOK");
        return Err(AppError::upstream(format!(
            "explorer {} {}: {} {}",
            module,
            action,
            envelope.message,
            envelope.result.as_str().unwrap_or_default()
        )));
    }

    serde_json::from_value(envelope.result).map_err(|e| {
        AppError::invalid_response(format!("explorer {} {} result: {}", module, action, e))
    })
}

/// Multi-file sources arrive as standard-json (wrapped in an extra pair of
/// braces); concatenate the file contents so pattern rules see plain Solidity
pub fn flatten_source(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return raw.to_string();
    }
    let inner = if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(inner) else {
        return raw.to_string();
    };
    let sources = value.get("sources").unwrap_or(&value);
    let Some(files) = sources.as_object() else {
        return raw.to_string();
    };
    let contents: Vec<&str> = files
        .values()
        .filter_map(|file| file.get("content").and_then(|c| c.as_str()))
        .collect();
    if contents.is_empty() {
        raw.to_string()
    } else {
        contents.join("\n")
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl ExplorerApi for EtherscanClient {
    async fn source_code(&self, chain: Chain, address: &str) -> AppResult<Option<ExplorerSource>> {
        let rows: Vec<RawSource> = self
            .query(chain, "contract", "getsourcecode", &[("address", address.to_string())])
            .await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        if row.source_code.trim().is_empty() {
            debug!(address, %chain, "Explorer reports contract not verified");
            return Ok(None);
        }
        Ok(Some(ExplorerSource {
            source_code: flatten_source(&row.source_code),
            contract_name: non_empty(row.contract_name),
            is_proxy: row.proxy == "1",
            implementation: non_empty(row.implementation).map(|a| a.to_lowercase()),
        }))
    }

    async fn contract_creation(&self, chain: Chain, address: &str) -> AppResult<Option<ContractCreation>> {
        let rows: Vec<RawCreation> = self
            .query(
                chain,
                "contract",
                "getcontractcreation",
                &[("contractaddresses", address.to_string())],
            )
            .await?;
        Ok(rows.into_iter().next().and_then(|row| {
            non_empty(row.contract_creator).map(|creator| ContractCreation {
                creator: creator.to_lowercase(),
                tx_hash: row.tx_hash,
                timestamp: row.timestamp.parse().ok(),
            })
        }))
    }

    async fn transactions(
        &self,
        chain: Chain,
        address: &str,
        limit: usize,
        order: SortOrder,
    ) -> AppResult<Vec<ExplorerTx>> {
        let rows: Vec<RawTx> = self
            .query(
                chain,
                "account",
                "txlist",
                &[
                    ("address", address.to_string()),
                    ("startblock", "0".to_string()),
                    ("endblock", "99999999".to_string()),
                    ("page", "1".to_string()),
                    ("offset", limit.to_string()),
                    ("sort", order.as_str().to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| ExplorerTx {
                hash: row.hash,
                from: row.from.to_lowercase(),
                to: row.to.to_lowercase(),
                timestamp: row.time_stamp.parse().unwrap_or(0),
                is_error: row.is_error == "1",
                function_name: row.function_name,
                contract_address: row.contract_address.to_lowercase(),
            })
            .collect())
    }

    async fn token_holders(&self, chain: Chain, token: &str, limit: usize) -> AppResult<Vec<TokenHolder>> {
        let rows: Vec<RawHolder> = self
            .query(
                chain,
                "token",
                "tokenholderlist",
                &[
                    ("contractaddress", token.to_string()),
                    ("page", "1".to_string()),
                    ("offset", limit.to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| TokenHolder {
                address: row.address.to_lowercase(),
                quantity: row.quantity,
            })
            .collect())
    }
}
