//! Providers Module - External Data Sources
//!
//! Raw access to chains, explorers and market data. Nothing here scores;
//! analyzers and oracles interpret what these clients return.

pub mod contract;
pub mod dexscreener;
pub mod explorer;
pub mod http;
pub mod rpc;
pub mod sourcify;

pub use dexscreener::{DexPair, DexScreenerClient, PairSource};
pub use explorer::{EtherscanClient, ExplorerApi, ExplorerTx, SortOrder};
pub use rpc::{BlockTag, ChainReader, RpcManager, RpcProvider};
pub use sourcify::{SourcifyApi, SourcifyClient, SourcifyMatch};
