//! Market lifecycle coordination
//!
//! Sequences the observable side effects of the agent: settle before
//! create, chain call before any persist, record before index. Market
//! mathematics stays behind the chain gateway; this module owns validation
//! and ordering only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::{ChainClient, TxReceipt};
use crate::error::{AgentError, Result};
use crate::persistence::AuditLog;
use crate::registry::{MarketRecordStore, RegistryIndex};
use crate::scanner::{ResolutionJudge, ScanSummary, SettlementScanner};
use crate::types::{CollateralToken, MarketRecord, Outcome, RegistryEntry, Settlement, TradingRules};

/// Decimals assumed for collateral passed as a raw address rather than a
/// configured symbol (the ERC20 default).
const FALLBACK_COLLATERAL_DECIMALS: u8 = 18;

/// Creation request as supplied by the caller; validated before any chain
/// call is made.
#[derive(Debug, Clone)]
pub struct CreateMarketRequest {
    pub question: String,
    pub end_time: DateTime<Utc>,
    pub initial_liquidity: Decimal,
    /// Configured symbol (e.g. "USDC") or a raw 0x token address
    pub collateral: String,
    pub trading_rules: TradingRules,
}

pub struct MarketLifecycleCoordinator {
    chain: Arc<dyn ChainClient>,
    records: Arc<MarketRecordStore>,
    index: Arc<RegistryIndex>,
    scanner: SettlementScanner,
    collateral_tokens: Vec<CollateralToken>,
    audit: Option<Arc<AuditLog>>,
}

impl MarketLifecycleCoordinator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        records: Arc<MarketRecordStore>,
        index: Arc<RegistryIndex>,
        judge: Arc<dyn ResolutionJudge>,
        collateral_tokens: Vec<CollateralToken>,
    ) -> Self {
        let scanner = SettlementScanner::new(
            records.clone(),
            index.clone(),
            chain.clone(),
            judge,
        );
        Self {
            chain,
            records,
            index,
            scanner,
            collateral_tokens,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Runs the settlement scanner over every due market. Invoked at
    /// startup, on every agent tick, and before each creation: unsettled
    /// obligations are never allowed to accumulate.
    pub async fn settle_due(&self, now: i64) -> Result<ScanSummary> {
        let summary = self.scanner.run(now).await?;
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_scan(&summary).await {
                warn!(error = %e, "audit log write failed");
            }
        }
        Ok(summary)
    }

    /// Creation sequence: settle outstanding markets, validate, call the
    /// chain, persist the record, append the index entry — in that order.
    ///
    /// A failed index append after a successful record write is only warned
    /// about; the next scan's repair pass re-appends the entry.
    pub async fn create_market(&self, request: CreateMarketRequest) -> Result<MarketRecord> {
        let now = Utc::now();
        self.settle_due(now.timestamp()).await?;

        Self::validate_request(&request, now)?;
        let collateral = self.resolve_collateral(&request.collateral)?;

        let created = self
            .chain
            .create_market(
                &request.question,
                request.end_time.timestamp(),
                request.initial_liquidity,
                &collateral,
            )
            .await?;

        let record = MarketRecord {
            condition_id: created.condition_id,
            question: request.question,
            created_at: now,
            end_time: request.end_time,
            collateral,
            initial_liquidity: request.initial_liquidity,
            create_tx_hash: created.tx_hash,
            trading_rules: request.trading_rules,
            settlement: Settlement::pending(),
        };
        self.records.write(&record)?;

        if let Err(e) = self.index.append(RegistryEntry::from_record(&record)) {
            warn!(
                condition_id = %record.condition_id,
                error = %e,
                "index append failed after record write; next scan will re-append"
            );
        }

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_creation(&record).await {
                warn!(error = %e, "audit log write failed");
            }
        }

        info!(
            condition_id = %record.condition_id,
            end_time = %record.end_time,
            liquidity = %record.initial_liquidity,
            "📈 market created"
        );
        Ok(record)
    }

    /// Buys outcome shares. Rejects markets whose trading window elapsed.
    pub async fn buy(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt> {
        self.check_tradeable(condition_id, amount)?;
        self.chain.buy(condition_id, amount, outcome, min_out).await
    }

    /// Sells outcome shares. Same trading-window guard as [`Self::buy`].
    pub async fn sell(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt> {
        self.check_tradeable(condition_id, amount)?;
        self.chain
            .sell(condition_id, amount, outcome, min_out)
            .await
    }

    /// Redeems winning tokens for collateral. Requires a settled record;
    /// callers check eligibility instead of relying on the chain to reject.
    pub async fn redeem(&self, condition_id: &str) -> Result<TxReceipt> {
        let record = self.records.read(condition_id)?;
        if !record.settlement.is_settled {
            return Err(AgentError::NotYetSettleable(condition_id.to_string()));
        }
        self.chain.redeem(condition_id).await
    }

    fn check_tradeable(&self, condition_id: &str, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AgentError::validation("amount must be positive"));
        }
        let record = self.records.read(condition_id)?;
        if record.settlement.is_settled || record.is_closed(Utc::now().timestamp()) {
            return Err(AgentError::MarketClosed(condition_id.to_string()));
        }
        Ok(())
    }

    fn validate_request(request: &CreateMarketRequest, now: DateTime<Utc>) -> Result<()> {
        if request.question.trim().is_empty() {
            return Err(AgentError::validation("question must not be empty"));
        }
        if request.end_time <= now {
            return Err(AgentError::validation("end time must be in the future"));
        }
        if request.initial_liquidity <= Decimal::ZERO {
            return Err(AgentError::validation(
                "initial liquidity must be positive",
            ));
        }
        if request.trading_rules.resolution_source.trim().is_empty() {
            return Err(AgentError::validation(
                "trading rules must name a resolution source",
            ));
        }
        Ok(())
    }

    /// Accepts a configured symbol, a configured token address, or any raw
    /// 0x address. Anything else is a validation failure.
    fn resolve_collateral(&self, raw: &str) -> Result<CollateralToken> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AgentError::validation("collateral token is required"));
        }
        if let Some(token) = self
            .collateral_tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(raw) || t.address.eq_ignore_ascii_case(raw))
        {
            return Ok(token.clone());
        }
        if is_hex_address(raw) {
            return Ok(CollateralToken {
                symbol: raw.to_string(),
                address: raw.to_string(),
                decimals: FALLBACK_COLLATERAL_DECIMALS,
            });
        }
        Err(AgentError::Validation(format!(
            "unknown collateral token '{raw}' (not a configured symbol or 0x address)"
        )))
    }
}

/// `0x` followed by exactly 20 hex-encoded bytes.
fn is_hex_address(raw: &str) -> bool {
    raw.len() == 42
        && raw.starts_with("0x")
        && hex::decode(&raw[2..]).map(|b| b.len() == 20).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CreatedMarket, MockChainClient};
    use crate::scanner::MockResolutionJudge;
    use chrono::Duration;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use std::fs;
    use std::path::PathBuf;

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "marketbot_lifecycle_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn usdc() -> CollateralToken {
        CollateralToken {
            symbol: "USDC".to_string(),
            address: "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".to_string(),
            decimals: 6,
        }
    }

    fn rules() -> TradingRules {
        TradingRules {
            resolution_source: "Coinbase BTC-USD daily close".to_string(),
            resolution_criteria: "Close strictly above 100000.00".to_string(),
            notes: String::new(),
        }
    }

    fn request(collateral: &str) -> CreateMarketRequest {
        CreateMarketRequest {
            question: "Will BTC close above 100k today?".to_string(),
            end_time: Utc::now() + Duration::hours(6),
            initial_liquidity: dec!(100),
            collateral: collateral.to_string(),
            trading_rules: rules(),
        }
    }

    struct Fixture {
        dir: PathBuf,
        records: Arc<MarketRecordStore>,
        index: Arc<RegistryIndex>,
    }

    impl Fixture {
        fn new(test_name: &str) -> Self {
            let dir = temp_data_dir(test_name);
            let records = Arc::new(MarketRecordStore::new(&dir).unwrap());
            let index = Arc::new(RegistryIndex::new(&dir).unwrap());
            Self {
                dir,
                records,
                index,
            }
        }

        fn coordinator(&self, chain: MockChainClient) -> MarketLifecycleCoordinator {
            MarketLifecycleCoordinator::new(
                Arc::new(chain),
                self.records.clone(),
                self.index.clone(),
                Arc::new(MockResolutionJudge::new()),
                vec![usdc()],
            )
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn chain_creating(condition_id: &'static str) -> MockChainClient {
        let mut chain = MockChainClient::new();
        chain
            .expect_create_market()
            .times(1)
            .returning(move |_, _, _, _| {
                Ok(CreatedMarket {
                    condition_id: condition_id.to_string(),
                    tx_hash: "0xc0ffee".to_string(),
                })
            });
        chain
    }

    #[tokio::test]
    async fn creation_persists_record_and_index_entry() {
        let fx = Fixture::new("create");
        let coordinator = fx.coordinator(chain_creating("0xabc"));

        let record = coordinator.create_market(request("USDC")).await.unwrap();
        assert_eq!(record.condition_id, "0xabc");

        // A read-back matches what creation returned, still unsettled.
        let loaded = fx.records.read("0xabc").unwrap();
        assert_eq!(loaded.condition_id, record.condition_id);
        assert!(!loaded.settlement.is_settled);
        assert_eq!(loaded.collateral, usdc());

        let index = fx.index.load().unwrap();
        assert_eq!(index.markets.len(), 1);
        assert_eq!(index.markets[0].condition_id, "0xabc");
        assert!(!index.markets[0].is_settled);
        assert!(index.markets[0].winner.is_none());
    }

    #[tokio::test]
    async fn unknown_collateral_symbol_fails_validation_before_the_chain() {
        let fx = Fixture::new("bad_collateral");
        // No expectations: the chain must never see this request.
        let coordinator = fx.coordinator(MockChainClient::new());

        let err = coordinator
            .create_market(request("DOGE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(msg) if msg.contains("DOGE")));
        assert!(fx.index.load().unwrap().markets.is_empty());
    }

    #[tokio::test]
    async fn raw_hex_address_collateral_is_accepted() {
        let fx = Fixture::new("hex_collateral");
        let coordinator = fx.coordinator(chain_creating("0xdef"));

        let record = coordinator
            .create_market(request("0x7ceb23fd6bc0add59e62ac25578270cff1b9f619"))
            .await
            .unwrap();
        assert_eq!(
            record.collateral.address,
            "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619"
        );
        assert_eq!(record.collateral.decimals, FALLBACK_COLLATERAL_DECIMALS);
    }

    #[tokio::test]
    async fn invalid_inputs_fail_validation() {
        let fx = Fixture::new("validation");
        let coordinator = fx.coordinator(MockChainClient::new());

        let mut empty_question = request("USDC");
        empty_question.question = "   ".to_string();
        assert!(matches!(
            coordinator.create_market(empty_question).await.unwrap_err(),
            AgentError::Validation(_)
        ));

        let mut past_end = request("USDC");
        past_end.end_time = Utc::now() - Duration::hours(1);
        assert!(matches!(
            coordinator.create_market(past_end).await.unwrap_err(),
            AgentError::Validation(_)
        ));

        let mut zero_liquidity = request("USDC");
        zero_liquidity.initial_liquidity = dec!(0);
        assert!(matches!(
            coordinator.create_market(zero_liquidity).await.unwrap_err(),
            AgentError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn lost_index_row_is_healed_by_the_next_scan() {
        let fx = Fixture::new("self_heal");
        let coordinator = fx.coordinator(chain_creating("0xabc"));
        coordinator.create_market(request("USDC")).await.unwrap();

        // Simulate the creation crash window: the index row is gone, the
        // record survived.
        fs::write(fx.index.path(), "{\"markets\":[]}").unwrap();

        let summary = coordinator
            .settle_due(Utc::now().timestamp())
            .await
            .unwrap();
        assert_eq!(summary.reindexed, vec!["0xabc".to_string()]);
        assert_eq!(fx.index.load().unwrap().markets.len(), 1);
    }

    #[tokio::test]
    async fn trading_a_closed_market_is_rejected() {
        let fx = Fixture::new("closed_market");
        let coordinator = fx.coordinator(chain_creating("0xabc"));
        let record = coordinator.create_market(request("USDC")).await.unwrap();

        // Force the window shut.
        let mut closed = record.clone();
        closed.end_time = Utc::now() - Duration::hours(1);
        fx.records.write(&closed).unwrap();

        let err = coordinator
            .buy("0xabc", dec!(10), Outcome::Yes, dec!(9))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MarketClosed(id) if id == "0xabc"));

        let err = coordinator
            .sell("0xabc", dec!(10), Outcome::No, dec!(9))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MarketClosed(_)));
    }

    #[tokio::test]
    async fn non_positive_trade_amount_is_rejected() {
        let fx = Fixture::new("bad_amount");
        let coordinator = fx.coordinator(MockChainClient::new());

        let err = coordinator
            .buy("0xabc", dec!(0), Outcome::Yes, dec!(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[tokio::test]
    async fn redeem_requires_local_settlement() {
        let fx = Fixture::new("redeem_unsettled");
        let coordinator = fx.coordinator(chain_creating("0xabc"));
        coordinator.create_market(request("USDC")).await.unwrap();

        let err = coordinator.redeem("0xabc").await.unwrap_err();
        assert!(matches!(err, AgentError::NotYetSettleable(id) if id == "0xabc"));
    }

    #[tokio::test]
    async fn redeem_passes_through_once_settled() {
        let fx = Fixture::new("redeem_settled");

        let mut chain = chain_creating("0xabc");
        chain
            .expect_redeem()
            .with(eq("0xabc"))
            .times(1)
            .returning(|_| {
                Ok(TxReceipt {
                    tx_hash: "0x4ede".to_string(),
                })
            });
        let coordinator = fx.coordinator(chain);

        let mut record = coordinator.create_market(request("USDC")).await.unwrap();
        record.settlement = Settlement::resolved(Outcome::Yes, Some("0x5e71".into()), Utc::now());
        fx.records.write(&record).unwrap();

        let receipt = coordinator.redeem("0xabc").await.unwrap();
        assert_eq!(receipt.tx_hash, "0x4ede");
    }

    #[test]
    fn hex_address_check_requires_twenty_bytes() {
        assert!(is_hex_address("0x7ceb23fd6bc0add59e62ac25578270cff1b9f619"));
        assert!(!is_hex_address("DOGE"));
        assert!(!is_hex_address("0x1234"));
        assert!(!is_hex_address("0xzzeb23fd6bc0add59e62ac25578270cff1b9f619"));
    }
}
