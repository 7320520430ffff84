//! Market gateway boundary
//!
//! The gateway wraps the market SDK and the underlying contracts. Market
//! mathematics (AMM pricing, liquidity provisioning, resolution payouts,
//! redemption) lives entirely on the other side of this boundary; the agent
//! only shapes requests and consumes results.

pub mod rest;
pub mod types;

pub use rest::*;
pub use types::*;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::types::{CollateralToken, Outcome};

/// Chain-interaction collaborator used by the lifecycle coordinator and the
/// settlement scanner.
///
/// All calls are blocking, fallible remote calls. No retry policy lives at
/// this layer; retries belong to the gateway or the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn create_market(
        &self,
        question: &str,
        end_time: i64,
        initial_liquidity: Decimal,
        collateral: &CollateralToken,
    ) -> Result<CreatedMarket>;

    async fn get_market_info(&self, condition_id: &str) -> Result<MarketInfo>;

    async fn get_market_prices(&self, condition_id: &str) -> Result<MarketPrices>;

    async fn buy(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt>;

    async fn sell(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt>;

    async fn is_resolved(&self, condition_id: &str) -> Result<bool>;

    async fn get_winning_token(&self, condition_id: &str) -> Result<String>;

    async fn get_token_id(&self, condition_id: &str, outcome: Outcome) -> Result<String>;

    async fn settle_market(&self, condition_id: &str, winning_token_id: &str) -> Result<TxReceipt>;

    async fn redeem(&self, condition_id: &str) -> Result<TxReceipt>;
}
