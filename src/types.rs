//! Core types used throughout MarketBot
//!
//! Defines the market record, the registry index projection, and the
//! outcome/collateral primitives. Serde field names are pinned to the
//! on-disk JSON layout (`markets/registry.json`, `markets/<conditionId>.json`);
//! external tooling reads these files, so the names are part of the contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary market outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "YES" => Some(Outcome::Yes),
            "NO" => Some(Outcome::No),
            _ => None,
        }
    }

}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// ERC20-style token backing a market's liquidity. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralToken {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

/// Free-text resolution contract recorded at creation time.
///
/// The criteria must be unambiguous, objective, time-bounded and name their
/// source; that is an editorial obligation on the market author, not
/// something this code checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingRules {
    pub resolution_source: String,
    pub resolution_criteria: String,
    #[serde(default)]
    pub notes: String,
}

/// Settlement state of a market. Mutated exactly once, by the settlement
/// flow; `is_settled` never reverts to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub is_settled: bool,
    pub settle_tx_hash: Option<String>,
    pub winner: Option<Outcome>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// State of a freshly created market.
    pub fn pending() -> Self {
        Self {
            is_settled: false,
            settle_tx_hash: None,
            winner: None,
            settled_at: None,
        }
    }

    pub fn resolved(
        winner: Outcome,
        settle_tx_hash: Option<String>,
        settled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            is_settled: true,
            settle_tx_hash,
            winner: Some(winner),
            settled_at: Some(settled_at),
        }
    }

    /// `winner` must be present iff `is_settled` is true.
    pub fn is_consistent(&self) -> bool {
        self.is_settled == self.winner.is_some()
    }
}

/// Full per-market record, keyed by condition id.
/// Persisted as `markets/<conditionId>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    /// Opaque unique identifier assigned by the chain at creation; primary key
    pub condition_id: String,
    /// Human-readable resolution question (immutable after creation)
    pub question: String,
    pub created_at: DateTime<Utc>,
    /// Trading-close boundary, fixed at creation
    pub end_time: DateTime<Utc>,
    pub collateral: CollateralToken,
    /// Human-readable decimal recorded at creation
    pub initial_liquidity: Decimal,
    /// Creation transaction hash, kept for audit
    pub create_tx_hash: String,
    pub trading_rules: TradingRules,
    pub settlement: Settlement,
}

impl MarketRecord {
    pub fn end_time_unix(&self) -> i64 {
        self.end_time.timestamp()
    }

    /// True once the trading window has elapsed.
    pub fn is_closed(&self, now: i64) -> bool {
        self.end_time_unix() <= now
    }
}

/// Index projection of a [`MarketRecord`], stored in `markets/registry.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub condition_id: String,
    pub question: String,
    pub end_time_unix: i64,
    pub is_settled: bool,
    pub winner: Option<Outcome>,
}

impl RegistryEntry {
    pub fn from_record(record: &MarketRecord) -> Self {
        Self {
            condition_id: record.condition_id.clone(),
            question: record.question.clone(),
            end_time_unix: record.end_time_unix(),
            is_settled: record.settlement.is_settled,
            winner: record.settlement.winner,
        }
    }

    /// Due: trading window closed, not yet settled.
    pub fn is_due(&self, now: i64) -> bool {
        !self.is_settled && self.end_time_unix <= now
    }
}

/// The master index file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub markets: Vec<RegistryEntry>,
}
