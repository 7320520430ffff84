//! Market creation script
//!
//! Usage: create-market "<question>" <end-time-rfc3339> <liquidity> <collateral> <resolution-source> <resolution-criteria> [notes]
//!
//! Settles any due markets first, then creates the market, persists its
//! record and registry entry, and prints the record as JSON to stdout.
//! Exits non-zero on any failure.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketbot::chain::{ChainClient, GatewayClient};
use marketbot::config::AppConfig;
use marketbot::lifecycle::{CreateMarketRequest, MarketLifecycleCoordinator};
use marketbot::persistence::AuditLog;
use marketbot::registry::{MarketRecordStore, RegistryIndex};
use marketbot::scanner::ChainPriceJudge;
use marketbot::types::TradingRules;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 6 {
        bail!(
            "usage: create-market \"<question>\" <end-time-rfc3339> <liquidity> <collateral> <resolution-source> <resolution-criteria> [notes]"
        );
    }

    let question = args[0].clone();
    let end_time: DateTime<Utc> = args[1]
        .parse()
        .with_context(|| format!("invalid end time '{}', expected RFC3339", args[1]))?;
    let initial_liquidity = Decimal::from_str(&args[2])
        .with_context(|| format!("invalid liquidity '{}'", args[2]))?;
    let collateral = args[3].clone();
    let trading_rules = TradingRules {
        resolution_source: args[4].clone(),
        resolution_criteria: args[5].clone(),
        notes: args.get(6).cloned().unwrap_or_default(),
    };

    let config = AppConfig::load()?;
    config.validate_env()?;

    let chain: Arc<dyn ChainClient> = Arc::new(GatewayClient::new(
        &config.chain.gateway_url,
        config.chain.chain_id,
        config.chain.request_timeout_ms,
        None,
        None,
    )?);
    let records = Arc::new(MarketRecordStore::new(&config.registry.data_dir)?);
    let index = Arc::new(RegistryIndex::new(&config.registry.data_dir)?);
    let judge = Arc::new(ChainPriceJudge::new(
        chain.clone(),
        config.scanner.price_threshold_pct,
    ));

    let mut coordinator = MarketLifecycleCoordinator::new(
        chain,
        records,
        index,
        judge,
        config.collateral.tokens.clone(),
    );
    if config.registry.audit_enabled {
        coordinator = coordinator.with_audit(Arc::new(AuditLog::new(&config.registry.audit_dir)?));
    }

    let record = coordinator
        .create_market(CreateMarketRequest {
            question,
            end_time,
            initial_liquidity,
            collateral,
            trading_rules,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
