//! One-shot settlement scan
//!
//! Usage: settle-due
//!
//! Scans the registry for markets past their end time, settles them, and
//! prints the scan summary as JSON to stdout. Exits non-zero if the scan
//! itself fails or any market failed to settle.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketbot::chain::{ChainClient, GatewayClient};
use marketbot::config::AppConfig;
use marketbot::lifecycle::MarketLifecycleCoordinator;
use marketbot::persistence::AuditLog;
use marketbot::registry::{MarketRecordStore, RegistryIndex};
use marketbot::scanner::ChainPriceJudge;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

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

    let summary = coordinator.settle_due(Utc::now().timestamp()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
