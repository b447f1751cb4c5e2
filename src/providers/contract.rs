//! Typed contract reads on top of `ChainReader`
//!
//! ERC20 metadata, ownership getters, LP balances and the EIP-1967 proxy slot.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use std::str::FromStr;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Chain;
use crate::providers::rpc::{BlockTag, ChainReader};
use crate::utils::constants::{EIP1967_IMPLEMENTATION_SLOT, ZERO_ADDRESS};

sol! {
    function name() external view returns (string);
    function symbol() external view returns (string);
    function owner() external view returns (address);
    function getOwner() external view returns (address);
    function balanceOf(address account) external view returns (uint256);
    function totalSupply() external view returns (uint256);
}

/// Result of probing the ownership getters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerRead {
    /// Lower-cased owner address (may be the zero address)
    Owner(String),
    /// Neither `owner()` nor `getOwner()` answered
    NoOwnerFunction,
}

pub fn parse_address(value: &str) -> AppResult<Address> {
    Address::from_str(value)
        .map_err(|e| AppError::invalid_address(format!("{}: {}", value, e)))
}

fn lower(address: Address) -> String {
    address.to_string().to_lowercase()
}

/// `eth_call`, folding reverts and empty returns into `None`
async fn try_call(reader: &dyn ChainReader, chain: Chain, to: &str, data: Vec<u8>) -> AppResult<Option<Vec<u8>>> {
    match reader.call(chain, to, &data).await {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.code == ErrorCode::UpstreamNotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// ERC20 `name()`; tokens with non-string names yield `None`
pub async fn read_name(reader: &dyn ChainReader, chain: Chain, token: &str) -> AppResult<Option<String>> {
    let data = try_call(reader, chain, token, nameCall {}.abi_encode()).await?;
    Ok(data
        .and_then(|d| nameCall::abi_decode_returns(&d, true).ok())
        .map(|r| r._0)
        .filter(|s| !s.trim().is_empty()))
}

pub async fn read_symbol(reader: &dyn ChainReader, chain: Chain, token: &str) -> AppResult<Option<String>> {
    let data = try_call(reader, chain, token, symbolCall {}.abi_encode()).await?;
    Ok(data
        .and_then(|d| symbolCall::abi_decode_returns(&d, true).ok())
        .map(|r| r._0)
        .filter(|s| !s.trim().is_empty()))
}

/// `owner()`, then BEP20-style `getOwner()`
pub async fn read_owner(reader: &dyn ChainReader, chain: Chain, contract: &str) -> AppResult<OwnerRead> {
    if let Some(data) = try_call(reader, chain, contract, ownerCall {}.abi_encode()).await? {
        if let Ok(ret) = ownerCall::abi_decode_returns(&data, true) {
            return Ok(OwnerRead::Owner(lower(ret._0)));
        }
    }
    if let Some(data) = try_call(reader, chain, contract, getOwnerCall {}.abi_encode()).await? {
        if let Ok(ret) = getOwnerCall::abi_decode_returns(&data, true) {
            return Ok(OwnerRead::Owner(lower(ret._0)));
        }
    }
    Ok(OwnerRead::NoOwnerFunction)
}

pub async fn read_balance_of(
    reader: &dyn ChainReader,
    chain: Chain,
    token: &str,
    holder: &str,
) -> AppResult<U256> {
    let account = parse_address(holder)?;
    let data = try_call(reader, chain, token, balanceOfCall { account }.abi_encode()).await?;
    Ok(data
        .and_then(|d| balanceOfCall::abi_decode_returns(&d, true).ok())
        .map(|r| r._0)
        .unwrap_or(U256::ZERO))
}

pub async fn read_total_supply(reader: &dyn ChainReader, chain: Chain, token: &str) -> AppResult<U256> {
    let data = try_call(reader, chain, token, totalSupplyCall {}.abi_encode()).await?;
    Ok(data
        .and_then(|d| totalSupplyCall::abi_decode_returns(&d, true).ok())
        .map(|r| r._0)
        .unwrap_or(U256::ZERO))
}

/// Implementation address from the EIP-1967 slot, if one is set
pub async fn read_implementation(
    reader: &dyn ChainReader,
    chain: Chain,
    proxy: &str,
) -> AppResult<Option<String>> {
    let word = reader
        .get_storage_at(chain, proxy, EIP1967_IMPLEMENTATION_SLOT)
        .await?;
    if word.len() < 20 {
        return Ok(None);
    }
    let implementation = Address::from_slice(&word[word.len() - 20..]);
    let implementation = lower(implementation);
    Ok((implementation != ZERO_ADDRESS).then_some(implementation))
}

/// Whether the address currently holds code
pub async fn is_contract(reader: &dyn ChainReader, chain: Chain, address: &str) -> AppResult<bool> {
    Ok(!reader.get_code(chain, address, BlockTag::Latest).await?.is_empty())
}

/// Share of `part` in `whole` as a percentage
pub fn share_percent(part: U256, whole: U256) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    // Basis points keep the division in integer space
    let bps = part.saturating_mul(U256::from(10_000u64)) / whole;
    let bps: u64 = bps.try_into().unwrap_or(u64::MAX);
    bps as f64 / 100.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_sol_types::SolValue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory chain keyed by (address, selector)
    #[derive(Default)]
    pub struct StaticChain {
        pub code: HashMap<String, Vec<u8>>,
        pub calls: Mutex<HashMap<(String, [u8; 4]), Vec<u8>>>,
        pub storage: HashMap<String, Vec<u8>>,
    }

    impl StaticChain {
        pub fn answer(&self, to: &str, selector: [u8; 4], ret: Vec<u8>) {
            self.calls
                .lock()
                .unwrap()
                .insert((to.to_lowercase(), selector), ret);
        }
    }

    #[async_trait]
    impl ChainReader for StaticChain {
        async fn get_code(&self, _: Chain, address: &str, _: BlockTag) -> AppResult<Vec<u8>> {
            Ok(self.code.get(&address.to_lowercase()).cloned().unwrap_or_default())
        }
        async fn get_transaction_count(&self, _: Chain, _: &str) -> AppResult<u64> {
            Ok(1)
        }
        async fn block_number(&self, _: Chain) -> AppResult<u64> {
            Ok(100)
        }
        async fn get_storage_at(&self, _: Chain, address: &str, _: &str) -> AppResult<Vec<u8>> {
            Ok(self.storage.get(&address.to_lowercase()).cloned().unwrap_or(vec![0u8; 32]))
        }
        async fn call(&self, _: Chain, to: &str, data: &[u8]) -> AppResult<Vec<u8>> {
            let selector: [u8; 4] = data[..4].try_into().unwrap();
            self.calls
                .lock()
                .unwrap()
                .get(&(to.to_lowercase(), selector))
                .cloned()
                .ok_or_else(|| AppError::not_found("execution reverted"))
        }
    }

    const TOKEN: &str = "0x1111111111111111111111111111111111111111";

    #[tokio::test]
    async fn test_owner_falls_back_to_get_owner() {
        let chain = StaticChain::default();
        let owner = parse_address("0x2222222222222222222222222222222222222222").unwrap();
        chain.answer(TOKEN, getOwnerCall::SELECTOR, (owner,).abi_encode_params());

        let read = read_owner(&chain, Chain::Ethereum, TOKEN).await.unwrap();
        assert_eq!(read, OwnerRead::Owner("0x2222222222222222222222222222222222222222".to_string()));
    }

    #[tokio::test]
    async fn test_no_owner_function() {
        let chain = StaticChain::default();
        assert_eq!(
            read_owner(&chain, Chain::Ethereum, TOKEN).await.unwrap(),
            OwnerRead::NoOwnerFunction
        );
    }

    #[tokio::test]
    async fn test_name_and_symbol() {
        let chain = StaticChain::default();
        chain.answer(TOKEN, nameCall::SELECTOR, ("Test Token".to_string(),).abi_encode_params());
        chain.answer(TOKEN, symbolCall::SELECTOR, ("TEST".to_string(),).abi_encode_params());

        assert_eq!(read_name(&chain, Chain::Ethereum, TOKEN).await.unwrap().as_deref(), Some("Test Token"));
        assert_eq!(read_symbol(&chain, Chain::Ethereum, TOKEN).await.unwrap().as_deref(), Some("TEST"));
    }

    #[tokio::test]
    async fn test_implementation_slot() {
        let mut chain = StaticChain::default();
        let mut word = vec![0u8; 12];
        word.extend_from_slice(&[0x33; 20]);
        chain.storage.insert(TOKEN.to_string(), word);

        let implementation = read_implementation(&chain, Chain::Ethereum, TOKEN).await.unwrap();
        assert_eq!(implementation.as_deref(), Some("0x3333333333333333333333333333333333333333"));

        let empty = StaticChain::default();
        assert!(read_implementation(&empty, Chain::Ethereum, TOKEN).await.unwrap().is_none());
    }

    #[test]
    fn test_share_percent() {
        assert_eq!(share_percent(U256::from(1u64), U256::from(4u64)), 25.0);
        assert_eq!(share_percent(U256::from(5u64), U256::ZERO), 0.0);
    }
}
