//! Wire types for the market gateway

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a successful market creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMarket {
    /// Identifier the rest of the system keys on
    pub condition_id: String,
    pub tx_hash: String,
}

/// On-chain market snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub question: String,
    /// Trading-close boundary as unix seconds
    pub end_time: i64,
    pub is_settled: bool,
    /// Collateral token address
    pub collateral: String,
    /// Liquidity reserve currently held by the market
    pub reserve: Decimal,
}

/// Current YES/NO pricing, in percent (the two sides sum to ~100).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrices {
    pub yes_price_percent: f64,
    pub no_price_percent: f64,
}

/// Transaction acknowledgement for trade, settle and redeem calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
}
