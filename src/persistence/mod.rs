//! CSV Audit Trail
//!
//! Every durable action the agent performs on chain lands in a daily CSV
//! file, so operators can reconcile the JSON registry against wallet
//! activity without parsing it.

use chrono::Utc;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;

use crate::error::Result;
use crate::scanner::ScanSummary;
use crate::types::MarketRecord;

/// Creation audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationRecord {
    pub timestamp: i64,
    pub condition_id: String,
    pub question: String,
    pub end_time_unix: i64,
    pub collateral_symbol: String,
    pub initial_liquidity: String,
    pub create_tx_hash: String,
}

/// Settlement audit row. `repaired` rows come from the scanner realigning
/// the index with an already-settled record instead of a fresh chain call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub timestamp: i64,
    pub condition_id: String,
    pub winner: String,
    pub settle_tx_hash: Option<String>,
    pub repaired: bool,
}

/// CSV audit log manager
pub struct AuditLog {
    creation_writer: Arc<AsyncRwLock<csv::Writer<std::fs::File>>>,
    settlement_writer: Arc<AsyncRwLock<csv::Writer<std::fs::File>>>,
}

impl AuditLog {
    /// Create a new audit log rooted at `data_dir`
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);
        fs::create_dir_all(data_dir.join("creations"))?;
        fs::create_dir_all(data_dir.join("settlements"))?;

        let today = Utc::now().format("%Y-%m-%d");
        let creation_writer = Self::create_writer(
            &data_dir.join("creations"),
            &format!("creations_{}.csv", today),
        )?;
        let settlement_writer = Self::create_writer(
            &data_dir.join("settlements"),
            &format!("settlements_{}.csv", today),
        )?;

        Ok(Self {
            creation_writer: Arc::new(AsyncRwLock::new(creation_writer)),
            settlement_writer: Arc::new(AsyncRwLock::new(settlement_writer)),
        })
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(true)
            .open(&path)?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    /// Log a market creation
    pub async fn log_creation(&self, record: &MarketRecord) -> Result<()> {
        let row = CreationRecord {
            timestamp: Utc::now().timestamp_millis(),
            condition_id: record.condition_id.clone(),
            question: record.question.clone(),
            end_time_unix: record.end_time_unix(),
            collateral_symbol: record.collateral.symbol.clone(),
            initial_liquidity: record.initial_liquidity.to_string(),
            create_tx_hash: record.create_tx_hash.clone(),
        };
        let mut writer = self.creation_writer.write().await;
        writer.serialize(&row)?;
        writer.flush()?;
        Ok(())
    }

    /// Log every settlement and repair from a scan run
    pub async fn log_scan(&self, summary: &ScanSummary) -> Result<()> {
        if summary.settled.is_empty() && summary.repaired.is_empty() {
            return Ok(());
        }
        let now = Utc::now().timestamp_millis();
        let mut writer = self.settlement_writer.write().await;
        for settled in &summary.settled {
            writer.serialize(SettlementRecord {
                timestamp: now,
                condition_id: settled.condition_id.clone(),
                winner: settled.winner.to_string(),
                settle_tx_hash: settled.settle_tx_hash.clone(),
                repaired: false,
            })?;
        }
        for repaired in &summary.repaired {
            writer.serialize(SettlementRecord {
                timestamp: now,
                condition_id: repaired.condition_id.clone(),
                winner: repaired.winner.to_string(),
                settle_tx_hash: repaired.settle_tx_hash.clone(),
                repaired: true,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SettledMarket;
    use crate::types::{CollateralToken, Outcome, Settlement, TradingRules};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "marketbot_audit_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn sample_record() -> MarketRecord {
        MarketRecord {
            condition_id: "0xabc".to_string(),
            question: "Q1".to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            end_time: Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
            collateral: CollateralToken {
                symbol: "USDC".to_string(),
                address: "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".to_string(),
                decimals: 6,
            },
            initial_liquidity: dec!(75),
            create_tx_hash: "0xc0ffee".to_string(),
            trading_rules: TradingRules {
                resolution_source: "source".to_string(),
                resolution_criteria: "criteria".to_string(),
                notes: String::new(),
            },
            settlement: Settlement::pending(),
        }
    }

    #[tokio::test]
    async fn log_creation_writes_header_and_row() {
        let dir = temp_data_dir("creation");
        let audit = AuditLog::new(dir.to_str().unwrap()).unwrap();

        audit.log_creation(&sample_record()).await.unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let content = fs::read_to_string(
            dir.join("creations").join(format!("creations_{}.csv", today)),
        )
        .unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap_or_default();
        assert!(
            header.starts_with("timestamp,condition_id,question,end_time_unix"),
            "unexpected header line: {}",
            header
        );
        let row = lines.next().expect("expected one data row after header");
        assert!(row.contains("0xabc"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn log_scan_writes_settled_and_repaired_rows() {
        let dir = temp_data_dir("scan");
        let audit = AuditLog::new(dir.to_str().unwrap()).unwrap();

        let summary = ScanSummary {
            scanned: 2,
            settled: vec![SettledMarket {
                condition_id: "0xaaa".to_string(),
                winner: Outcome::Yes,
                settle_tx_hash: Some("0x5e77".to_string()),
            }],
            reindexed: vec![],
            repaired: vec![SettledMarket {
                condition_id: "0xbbb".to_string(),
                winner: Outcome::No,
                settle_tx_hash: None,
            }],
            failed: vec![],
        };
        audit.log_scan(&summary).await.unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let content = fs::read_to_string(
            dir.join("settlements")
                .join(format!("settlements_{}.csv", today)),
        )
        .unwrap();
        let rows: Vec<&str> = content.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("0xaaa") && rows[0].contains("YES") && rows[0].ends_with("false"));
        assert!(rows[1].contains("0xbbb") && rows[1].contains("NO") && rows[1].ends_with("true"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_scan_writes_nothing() {
        let dir = temp_data_dir("empty_scan");
        let audit = AuditLog::new(dir.to_str().unwrap()).unwrap();

        audit.log_scan(&ScanSummary::default()).await.unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let path = dir
            .join("settlements")
            .join(format!("settlements_{}.csv", today));
        let len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        assert_eq!(len, 0, "expected no bytes written for an empty scan");

        let _ = fs::remove_dir_all(&dir);
    }
}
