//! Final-price resolution judge
//!
//! Decides the winner from the last traded prices on the chain — the signal
//! the market's own AMM converged to at close. The agent binary wires this
//! judge in by default; callers with an external data source (an oracle, a
//! human desk) supply their own [`ResolutionJudge`] instead.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::ResolutionJudge;
use crate::chain::ChainClient;
use crate::error::{AgentError, Result};
use crate::types::{MarketRecord, Outcome};

pub struct ChainPriceJudge {
    chain: Arc<dyn ChainClient>,
    /// Minimum share (percent) a side needs for a verdict
    threshold_pct: f64,
}

impl ChainPriceJudge {
    pub fn new(chain: Arc<dyn ChainClient>, threshold_pct: f64) -> Self {
        Self {
            chain,
            threshold_pct,
        }
    }
}

#[async_trait]
impl ResolutionJudge for ChainPriceJudge {
    async fn decide(&self, record: &MarketRecord) -> Result<Outcome> {
        let prices = self.chain.get_market_prices(&record.condition_id).await?;
        debug!(
            condition_id = %record.condition_id,
            yes = prices.yes_price_percent,
            no = prices.no_price_percent,
            source = %record.trading_rules.resolution_source,
            "resolving from final prices"
        );

        if prices.yes_price_percent >= self.threshold_pct {
            Ok(Outcome::Yes)
        } else if prices.no_price_percent >= self.threshold_pct {
            Ok(Outcome::No)
        } else {
            // Leave the market for a later run or a manual verdict.
            Err(AgentError::validation(format!(
                "final prices for {} are too close to call (YES {:.1}% / NO {:.1}%)",
                record.condition_id, prices.yes_price_percent, prices.no_price_percent
            )))
        }
    }
}
