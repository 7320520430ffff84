//! Market info lookup
//!
//! Usage: market-info <conditionId>
//!
//! Prints the on-chain market state, current prices and the local record
//! (when this agent created the market) as one JSON document. Exits
//! non-zero on any failure.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marketbot::chain::{ChainClient, GatewayClient, MarketInfo, MarketPrices};
use marketbot::config::AppConfig;
use marketbot::error::AgentError;
use marketbot::registry::MarketRecordStore;
use marketbot::types::MarketRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketReport {
    condition_id: String,
    chain: MarketInfo,
    prices: MarketPrices,
    resolved: bool,
    record: Option<MarketRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let condition_id = std::env::args()
        .nth(1)
        .context("usage: market-info <conditionId>")?;

    let config = AppConfig::load()?;
    let chain: Arc<dyn ChainClient> = Arc::new(GatewayClient::new(
        &config.chain.gateway_url,
        config.chain.chain_id,
        config.chain.request_timeout_ms,
        None,
        None,
    )?);
    let records = MarketRecordStore::new(&config.registry.data_dir)?;

    let info = chain.get_market_info(&condition_id).await?;
    let prices = chain.get_market_prices(&condition_id).await?;
    let resolved = chain.is_resolved(&condition_id).await?;
    // Markets created elsewhere have no local record; that is not an error.
    let record = match records.read(&condition_id) {
        Ok(record) => Some(record),
        Err(AgentError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let report = MarketReport {
        condition_id,
        chain: info,
        prices,
        resolved,
        record,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
