//! MarketBot agent
//!
//! Long-running settle-before-create loop: on startup and on every tick the
//! registry is scanned for due markets, which are settled before the agent
//! does anything else. Creation happens through the `create-market` script
//! or library callers; this binary keeps the obligations ledger clean.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use marketbot::chain::{ChainClient, GatewayClient};
use marketbot::config::AppConfig;
use marketbot::lifecycle::MarketLifecycleCoordinator;
use marketbot::persistence::AuditLog;
use marketbot::registry::{MarketRecordStore, RegistryIndex};
use marketbot::scanner::{find_due, ChainPriceJudge};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate_env()?;
    info!("🤖 MarketBot starting | {}", config.digest());

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
        index.clone(),
        judge,
        config.collateral.tokens.clone(),
    );
    if config.registry.audit_enabled {
        coordinator = coordinator.with_audit(Arc::new(AuditLog::new(&config.registry.audit_dir)?));
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.scanner.interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now().timestamp();
                if config.bot.dry_run {
                    // Report-only: list due markets without touching the chain.
                    let loaded = index.load()?;
                    let due: Vec<&str> = find_due(&loaded, now)
                        .map(|e| e.condition_id.as_str())
                        .collect();
                    if !due.is_empty() {
                        info!(due = due.len(), markets = ?due, "dry run: due markets pending settlement");
                    }
                    continue;
                }
                match coordinator.settle_due(now).await {
                    Ok(summary) => {
                        if summary.scanned > 0 || !summary.reindexed.is_empty() {
                            info!(
                                scanned = summary.scanned,
                                settled = summary.settled.len(),
                                reindexed = summary.reindexed.len(),
                                repaired = summary.repaired.len(),
                                failed = summary.failed.len(),
                                "scan cycle complete"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "scan cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}
