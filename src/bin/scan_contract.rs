//! Analyze one contract from the command line and print its RiskRecord as JSON
//!
//! Usage:
//!   scan_contract <ADDRESS> [CHAIN] [quick|deep]
//!
//! Same pipeline and environment as the API server, no HTTP.

use std::env;

use ruster_scan::api::handlers::is_valid_address;
use ruster_scan::{AppError, Chain, ScanConfig, ScanDepth, Scanner};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <ADDRESS> [CHAIN] [quick|deep]", args[0]);
        std::process::exit(1);
    }

    let address = &args[1];
    if !is_valid_address(address) {
        return Err(AppError::invalid_address(format!("Not a contract address: {}", address)).into());
    }
    let chain = match args.get(2) {
        Some(name) => Chain::from_name(name).ok_or_else(|| AppError::unsupported_chain(name))?,
        None => Chain::default(),
    };
    let depth = match args.get(3) {
        Some(name) => ScanDepth::from_name(name).ok_or_else(|| AppError::invalid_depth(name))?,
        None => ScanDepth::default(),
    };

    let scanner = Scanner::from_config(&ScanConfig::from_env())?;
    let record = scanner.analyze(address, chain, depth).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
