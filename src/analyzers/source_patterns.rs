//! Source pattern analyzer
//!
//! Scans verified Solidity source for privileged capabilities. Comments are
//! stripped first so commented-out code never matches. Capability rules only
//! fire when the matched function is access-restricted (`onlyOwner`-style
//! modifier, `hasRole`, or an explicit owner check); an open `mint` is a
//! different problem and not what these rules look for.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use super::{AnalysisContext, Analyzer, AnalyzerCategory};
use crate::models::errors::AppResult;
use crate::models::types::{AnalyzerResult, ContractInfo, Finding, FindingKind, Severity};

const NAME: &str = "source_patterns";

/// What a rule matches against
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Function declarations whose name matches; optional body pattern
    Function { body: Option<&'static str> },
    /// Any occurrence in the stripped source
    Statement,
    /// `address private|internal <name>` declarations, minus allowed names
    OwnerVariable { allow: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy)]
struct SourceRule {
    kind: FindingKind,
    pattern: &'static str,
    target: Target,
    severity: Severity,
    score: i32,
    requires_restriction: bool,
    /// Expected in proxies; reported one step lower at half score
    proxy_downgrade: bool,
    description: &'static str,
}

const RULES: [SourceRule; 12] = [
    SourceRule {
        kind: FindingKind::OwnerMint,
        pattern: r"(?i:mint)\w*",
        target: Target::Function { body: None },
        severity: Severity::High,
        score: 20,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged account can mint new tokens",
    },
    SourceRule {
        kind: FindingKind::Blacklist,
        pattern: r"\w*(?i:blacklist|blocklist|bot)\w*",
        target: Target::Function { body: None },
        severity: Severity::High,
        score: 25,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged account can block addresses from trading",
    },
    SourceRule {
        kind: FindingKind::TradingPause,
        pattern: r"\w*(?i:pause|trading)\w*",
        target: Target::Function { body: None },
        severity: Severity::Medium,
        score: 10,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged account can pause or gate trading",
    },
    SourceRule {
        kind: FindingKind::AdjustableFees,
        pattern: r"(?i:set|update|change|adjust)\w*(?i:fee|tax)\w*",
        target: Target::Function { body: None },
        severity: Severity::High,
        score: 15,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged account can change transfer fees",
    },
    SourceRule {
        kind: FindingKind::TransactionLimits,
        pattern: r"(?i:set|update|change|remove)\w*(?i:maxtx|maxwallet|maxtransaction|limit)\w*",
        target: Target::Function { body: None },
        severity: Severity::Medium,
        score: 10,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged account can change transaction or wallet limits",
    },
    SourceRule {
        kind: FindingKind::BalanceManipulation,
        pattern: r"\w+",
        target: Target::Function {
            body: Some(r"_balances\s*\[[^\]]+\]\s*=[^=]"),
        },
        severity: Severity::Critical,
        score: 30,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Privileged function writes holder balances directly",
    },
    SourceRule {
        kind: FindingKind::AntiBotTrap,
        pattern: r"\w*(?i:cooldown|antibot|sniper|antisnipe)\w*",
        target: Target::Function { body: None },
        severity: Severity::Medium,
        score: 10,
        requires_restriction: true,
        proxy_downgrade: false,
        description: "Anti-bot or cooldown controls the owner can tune",
    },
    SourceRule {
        kind: FindingKind::SelfDestruct,
        pattern: r"\b(?:selfdestruct|suicide)\s*\(",
        target: Target::Statement,
        severity: Severity::High,
        score: 20,
        requires_restriction: false,
        proxy_downgrade: false,
        description: "Contract can self-destruct",
    },
    SourceRule {
        kind: FindingKind::DelegateCall,
        pattern: r"\.delegatecall\s*\(",
        target: Target::Statement,
        severity: Severity::Medium,
        score: 10,
        requires_restriction: false,
        proxy_downgrade: true,
        description: "Contract delegates execution to other code",
    },
    SourceRule {
        kind: FindingKind::TxOriginAuth,
        pattern: r"\btx\.origin\b",
        target: Target::Statement,
        severity: Severity::Medium,
        score: 10,
        requires_restriction: false,
        proxy_downgrade: false,
        description: "Uses tx.origin, which is unsafe for authorization",
    },
    SourceRule {
        kind: FindingKind::HiddenOwner,
        pattern: r"\baddress\s+(?:payable\s+)?(?:private|internal)\s+(\w*[oO]wner\w*)\s*[;=]",
        target: Target::OwnerVariable {
            allow: &["_owner", "_pendingOwner"],
        },
        severity: Severity::Medium,
        score: 15,
        requires_restriction: false,
        proxy_downgrade: false,
        description: "Non-standard private owner variable",
    },
    SourceRule {
        kind: FindingKind::RenouncedOwnership,
        pattern: r"\brenounceOwnership\s*\(\s*\)\s*;",
        target: Target::Statement,
        severity: Severity::Safe,
        score: -5,
        requires_restriction: false,
        proxy_downgrade: false,
        description: "Source renounces ownership",
    },
];

struct CompiledRule {
    rule: SourceRule,
    regex: Regex,
    body: Option<Regex>,
}

lazy_static! {
    static ref COMMENTS: Regex = Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("comment regex");
    static ref RESTRICTION: Regex = Regex::new(concat!(
        r"\bonly[A-Z]\w*|\bhasRole\s*\(|\b_?checkOwner\s*\(|\b_?checkRole\s*\(",
        r"|(?:msg\.sender|_msgSender\(\))\s*==\s*(?:_?owner\b|owner\(\))",
        r"|(?:_?owner\b|owner\(\))\s*==\s*(?:msg\.sender|_msgSender\(\))",
    ))
    .expect("restriction regex");
    static ref COMPILED: Vec<CompiledRule> = RULES
        .iter()
        .map(|rule| {
            let pattern = match rule.target {
                Target::Function { .. } => format!(r"\bfunction\s+({})\s*\(", rule.pattern),
                _ => rule.pattern.to_string(),
            };
            let body = match rule.target {
                Target::Function { body: Some(b) } => Some(Regex::new(b).expect("body regex")),
                _ => None,
            };
            CompiledRule {
                rule: *rule,
                regex: Regex::new(&pattern).expect("rule regex"),
                body,
            }
        })
        .collect();
}

/// Remove block and line comments
pub fn strip_comments(source: &str) -> String {
    COMMENTS.replace_all(source, "").into_owned()
}

/// Header and body of the function declared at `start`.
/// `None` for body-less declarations (interfaces, abstract functions).
fn function_span(source: &str, start: usize) -> Option<&str> {
    let rest = &source[start..];
    let open = rest.find(['{', ';'])?;
    if rest.as_bytes()[open] == b';' {
        return None;
    }

    let mut depth = 0usize;
    for (i, c) in rest[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    // Unbalanced braces: take the rest of the file
    Some(rest)
}

fn is_restricted(span: &str) -> bool {
    RESTRICTION.is_match(span)
}

/// Names or snippets that triggered the rule; empty when it did not fire
fn evaluate(compiled: &CompiledRule, source: &str) -> Vec<String> {
    let rule = &compiled.rule;
    let mut hits = BTreeSet::new();

    match rule.target {
        Target::Function { .. } => {
            for caps in compiled.regex.captures_iter(source) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let Some(span) = function_span(source, whole.start()) else {
                    continue;
                };
                if rule.requires_restriction && !is_restricted(span) {
                    continue;
                }
                if let Some(body) = &compiled.body {
                    if !body.is_match(span) {
                        continue;
                    }
                }
                hits.insert(name.as_str().to_string());
            }
        }
        Target::Statement => {
            for m in compiled.regex.find_iter(source) {
                // Declarations are not statements
                if source[..m.start()].trim_end().ends_with("function") {
                    continue;
                }
                hits.insert(m.as_str().split_whitespace().collect::<String>());
            }
        }
        Target::OwnerVariable { allow } => {
            for caps in compiled.regex.captures_iter(source) {
                if let Some(name) = caps.get(1) {
                    if !allow.contains(&name.as_str()) {
                        hits.insert(name.as_str().to_string());
                    }
                }
            }
        }
    }
    hits.into_iter().collect()
}

/// Run every rule over one source text
pub fn scan_source(source: &str, is_proxy: bool) -> AnalyzerResult {
    let stripped = strip_comments(source);
    let mut result = AnalyzerResult::new();

    for compiled in COMPILED.iter() {
        let hits = evaluate(compiled, &stripped);
        if hits.is_empty() {
            continue;
        }
        let rule = &compiled.rule;
        let (severity, score) = if is_proxy && rule.proxy_downgrade {
            (rule.severity.downgrade(), rule.score / 2)
        } else {
            (rule.severity, rule.score)
        };
        result.push(
            Finding::new(rule.kind, severity, rule.description, score, NAME)
                .with_evidence(serde_json::json!({ "matches": hits })),
        );
    }
    result
}

pub struct SourcePatternAnalyzer;

#[async_trait]
impl Analyzer for SourcePatternAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn category(&self) -> AnalyzerCategory {
        AnalyzerCategory::Code
    }

    fn should_run(&self, ctx: &AnalysisContext<'_>) -> bool {
        ctx.info.has_source()
    }

    async fn analyze(&self, info: &ContractInfo) -> AppResult<AnalyzerResult> {
        let Some(source) = info.source_code.as_deref() else {
            return Ok(AnalyzerResult::new());
        };
        Ok(scan_source(source, info.is_proxy))
    }
}
