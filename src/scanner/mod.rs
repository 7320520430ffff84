//! Due-settlement scanner
//!
//! Finds every market whose trading window has closed but which has not
//! been resolved, drives each through resolution exactly once per run, and
//! repairs index/record drift left behind by a crashed agent. The YES/NO
//! decision itself comes from an injected [`ResolutionJudge`]; the scanner
//! only invokes it and persists the result.

pub mod judge;

pub use judge::*;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::{ChainClient, TxReceipt};
use crate::error::{AgentError, Result};
use crate::registry::{MarketRecordStore, RegistryIndex};
use crate::types::{MarketRecord, Outcome, RegistryEntry, RegistryFile, Settlement};

/// Caller-supplied judgment boundary: decides YES or NO for a closed market
/// from its recorded trading rules and whatever external data the
/// implementation consults.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResolutionJudge: Send + Sync {
    async fn decide(&self, record: &MarketRecord) -> Result<Outcome>;
}

/// Entries whose trading window has closed and which are still unsettled,
/// lazily, in index insertion order.
pub fn find_due(index: &RegistryFile, now: i64) -> impl Iterator<Item = &RegistryEntry> {
    index.markets.iter().filter(move |entry| entry.is_due(now))
}

/// One market settled (or realigned) by a scan run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledMarket {
    pub condition_id: String,
    pub winner: Outcome,
    pub settle_tx_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub condition_id: String,
    pub error: String,
}

/// Outcome of a full scan pass, shaped for JSON output.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Due entries considered this run
    pub scanned: usize,
    /// Markets resolved and settled this run
    pub settled: Vec<SettledMarket>,
    /// Records re-appended after being found missing from the index
    pub reindexed: Vec<String>,
    /// Index rows realigned with records that were already settled
    pub repaired: Vec<SettledMarket>,
    /// Per-market failures; these never abort the rest of the scan
    pub failed: Vec<ScanFailure>,
}

pub struct SettlementScanner {
    records: Arc<MarketRecordStore>,
    index: Arc<RegistryIndex>,
    chain: Arc<dyn ChainClient>,
    judge: Arc<dyn ResolutionJudge>,
}

impl SettlementScanner {
    pub fn new(
        records: Arc<MarketRecordStore>,
        index: Arc<RegistryIndex>,
        chain: Arc<dyn ChainClient>,
        judge: Arc<dyn ResolutionJudge>,
    ) -> Self {
        Self {
            records,
            index,
            chain,
            judge,
        }
    }

    /// Full scan: repair pass first, then settle every due market. Each
    /// failure is logged and reported in the summary without stopping the
    /// run.
    pub async fn run(&self, now: i64) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        self.reindex_orphan_records(&mut summary)?;

        let index = self.index.load()?;
        let due: Vec<RegistryEntry> = find_due(&index, now).cloned().collect();
        summary.scanned = due.len();

        for entry in due {
            match self.resolve_one(&entry, now).await {
                Ok(settled) => {
                    info!(
                        condition_id = %settled.condition_id,
                        winner = %settled.winner,
                        "market settled"
                    );
                    summary.settled.push(settled);
                }
                Err(AgentError::AlreadySettled(id)) => {
                    // Record and chain already agree; only the index row is
                    // stale. Realign it without touching the chain.
                    let repaired = self.repair_index_row(&id)?;
                    summary.repaired.push(repaired);
                }
                Err(e) => {
                    warn!(
                        condition_id = %entry.condition_id,
                        error = %e,
                        "settlement attempt failed"
                    );
                    summary.failed.push(ScanFailure {
                        condition_id: entry.condition_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Drives one due entry through resolution.
    ///
    /// `NotDue` guards against premature calls. `AlreadySettled` fires when
    /// the record on disk already shows resolved — the record is
    /// authoritative over a stale index, and no chain call may follow.
    pub async fn resolve_one(&self, entry: &RegistryEntry, now: i64) -> Result<SettledMarket> {
        if entry.end_time_unix > now {
            return Err(AgentError::NotDue(entry.condition_id.clone()));
        }
        let mut record = self.records.read(&entry.condition_id)?;
        if record.settlement.is_settled {
            return Err(AgentError::AlreadySettled(entry.condition_id.clone()));
        }

        let decided = self.judge.decide(&record).await?;
        let (winner, settle_tx_hash) = match self.settle_on_chain(&record.condition_id, decided).await
        {
            Ok(receipt) => (decided, Some(receipt.tx_hash)),
            Err(AgentError::AlreadySettledOnChain(_)) => {
                // A previous run died after its chain call went through; read
                // the verdict back from the chain instead of settling twice.
                (self.winner_from_chain(&record.condition_id).await?, None)
            }
            Err(e) => return Err(e),
        };

        record.settlement = Settlement::resolved(winner, settle_tx_hash.clone(), Utc::now());
        self.records.write(&record)?;
        self.index.mark_settled(&record.condition_id, winner)?;

        Ok(SettledMarket {
            condition_id: record.condition_id,
            winner,
            settle_tx_hash,
        })
    }

    async fn settle_on_chain(&self, condition_id: &str, winner: Outcome) -> Result<TxReceipt> {
        let token_id = self.chain.get_token_id(condition_id, winner).await?;
        self.chain.settle_market(condition_id, &token_id).await
    }

    /// Recovers the decided outcome from the chain when settlement already
    /// happened there.
    async fn winner_from_chain(&self, condition_id: &str) -> Result<Outcome> {
        let winning = self.chain.get_winning_token(condition_id).await?;
        let yes = self.chain.get_token_id(condition_id, Outcome::Yes).await?;
        Ok(if winning == yes {
            Outcome::Yes
        } else {
            Outcome::No
        })
    }

    /// Records on disk that never made it into the index (a crash between
    /// record write and index append) are re-appended here.
    fn reindex_orphan_records(&self, summary: &mut ScanSummary) -> Result<()> {
        let index = self.index.load()?;
        for condition_id in self.records.list_condition_ids()? {
            if index
                .markets
                .iter()
                .any(|m| m.condition_id == condition_id)
            {
                continue;
            }
            let record = match self.records.read(&condition_id) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        condition_id = %condition_id,
                        error = %e,
                        "unreadable record skipped during reindex"
                    );
                    summary.failed.push(ScanFailure {
                        condition_id: condition_id.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            match self.index.append(RegistryEntry::from_record(&record)) {
                Ok(()) => {
                    info!(condition_id = %condition_id, "re-appended record missing from index");
                    summary.reindexed.push(condition_id);
                }
                // Another writer got there between our load and append.
                Err(AgentError::DuplicateConditionId(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Aligns a stale index row with a record whose settlement already
    /// completed (a crash between the record write and the index update).
    fn repair_index_row(&self, condition_id: &str) -> Result<SettledMarket> {
        let record = self.records.read(condition_id)?;
        let winner = record.settlement.winner.ok_or_else(|| {
            AgentError::validation(format!(
                "record {condition_id} is marked settled but carries no winner"
            ))
        })?;
        match self.index.mark_settled(condition_id, winner) {
            // Another writer repaired it first; same end state.
            Ok(()) | Err(AgentError::AlreadySettled(_)) => {
                info!(condition_id, winner = %winner, "repaired index row from settled record");
                Ok(SettledMarket {
                    condition_id: condition_id.to_string(),
                    winner,
                    settle_tx_hash: record.settlement.settle_tx_hash,
                })
            }
            Err(e) => Err(e),
        }
    }
}
