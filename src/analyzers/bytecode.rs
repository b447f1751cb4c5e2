//! Bytecode heuristics for contracts without verified source
//!
//! Scans PUSH4 immediates for known control-function selectors and counts
//! SELFDESTRUCT / DELEGATECALL opcodes. Both signals are weak without source:
//! selector hits score low, opcode counts are reported at zero.

use alloy_primitives::keccak256;
use async_trait::async_trait;
use lazy_static::lazy_static;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};
use crate::providers::rpc::{BlockTag, ChainReader};

const NAME: &str = "bytecode";

const OP_PUSH1: u8 = 0x60;
const OP_PUSH4: u8 = 0x63;
const OP_PUSH32: u8 = 0x7f;
const OP_DELEGATECALL: u8 = 0xf4;
const OP_SELFDESTRUCT: u8 = 0xff;

/// Blacklist, trading-control and fee-control functions
const CONTROL_SIGNATURES: [&str; 16] = [
    "blacklist(address)",
    "addToBlacklist(address)",
    "setBlacklist(address,bool)",
    "addBot(address)",
    "addBots(address[])",
    "setBots(address[])",
    "blockBots(address[])",
    "enableTrading()",
    "openTrading()",
    "setTradingEnabled(bool)",
    "pause()",
    "setMaxTxAmount(uint256)",
    "setFee(uint256)",
    "setTaxFeePercent(uint256)",
    "setFees(uint256,uint256)",
    "mint(address,uint256)",
];

lazy_static! {
    static ref CONTROL_SELECTORS: Vec<([u8; 4], &'static str)> = CONTROL_SIGNATURES
        .iter()
        .map(|sig| {
            let hash = keccak256(sig.as_bytes());
            ([hash[0], hash[1], hash[2], hash[3]], *sig)
        })
        .collect();
}

/// What a linear opcode walk found
#[derive(Debug, Default, PartialEq)]
pub struct BytecodeScan {
    pub selectors: BTreeSet<&'static str>,
    pub selfdestruct: usize,
    pub delegatecall: usize,
}

/// Walk opcodes, skipping PUSH immediates so data bytes are not read as code
pub fn scan_bytecode(code: &[u8]) -> BytecodeScan {
    let mut scan = BytecodeScan::default();
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        match op {
            OP_PUSH4 if pc + 4 < code.len() => {
                let immediate = &code[pc + 1..pc + 5];
                if let Some((_, sig)) = CONTROL_SELECTORS.iter().find(|(sel, _)| sel == immediate) {
                    scan.selectors.insert(*sig);
                }
            }
            OP_DELEGATECALL => scan.delegatecall += 1,
            OP_SELFDESTRUCT => scan.selfdestruct += 1,
            _ => {}
        }
        pc += 1;
        if (OP_PUSH1..=OP_PUSH32).contains(&op) {
            pc += (op - OP_PUSH1 + 1) as usize;
        }
    }
    scan
}

pub struct BytecodeAnalyzer {
    reader: Arc<dyn ChainReader>,
}

impl BytecodeAnalyzer {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Analyzer for BytecodeAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Code
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        ctx.using_fallback
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        let code = self
            .reader
            .get_code(info.chain, &info.address, BlockTag::Latest)
            .await?;
        if code.is_empty() {
            return Ok(AnalyzerResult::new().with(Finding::info(
                FindingKind::NoBytecode,
                "No bytecode at this address",
                NAME,
            )));
        }

        let scan = scan_bytecode(&code);
        let mut result = AnalyzerResult::new();

        if !scan.selectors.is_empty() {
            result.push(
                Finding::new(
                    FindingKind::BytecodeSelector,
                    Severity::Low,
                    "Bytecode exposes blacklist, trading or fee control functions",
                    5,
                    NAME,
                )
                .with_evidence(serde_json::json!({ "functions": scan.selectors })),
            );
        }
        for (opcode, count) in [("SELFDESTRUCT", scan.selfdestruct), ("DELEGATECALL", scan.delegatecall)] {
            if count > 0 {
                result.push(
                    Finding::info(
                        FindingKind::BytecodeOpcode,
                        format!("{} opcode appears {} time(s)", opcode, count),
                        NAME,
                    )
                    .with_evidence(serde_json::json!({ "opcode": opcode, "count": count })),
                );
            }
        }
        Ok(result)
    }
}
