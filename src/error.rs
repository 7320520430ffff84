//! Typed failure taxonomy for the agent
//!
//! Every failure surfaces to the caller unmodified; the only automatically
//! recovered situation in the crate is a missing registry file on first run,
//! which loads as an empty index instead of erroring.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad caller input: empty question, non-positive amount or duration,
    /// unknown collateral symbol.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("market {0} not found")]
    NotFound(String),

    /// Creation is append-only; an id already in the index is never
    /// silently overwritten.
    #[error("market {0} is already registered")]
    DuplicateConditionId(String),

    /// Settlement is not re-entrant.
    #[error("market {0} is already settled")]
    AlreadySettled(String),

    /// The trading window has not closed yet.
    #[error("market {0} is not due for settlement")]
    NotDue(String),

    /// The trading window has elapsed; no further buys or sells.
    #[error("market {0} is closed for trading")]
    MarketClosed(String),

    /// The chain reports the market as already resolved.
    #[error("market {0} is already settled on chain")]
    AlreadySettledOnChain(String),

    /// The chain rejected the call as premature.
    #[error("market {0} is not yet settleable on chain")]
    NotYetSettleable(String),

    /// Opaque failure bubbled up from the chain gateway (RPC failure,
    /// insufficient allowance, ...).
    #[error("chain call failed: {0}")]
    ExternalCall(anyhow::Error),

    #[error("registry io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("audit log error: {0}")]
    Csv(#[from] csv::Error),
}

impl AgentError {
    pub fn validation(message: impl Into<String>) -> Self {
        AgentError::Validation(message.into())
    }

    pub fn external(error: impl Into<anyhow::Error>) -> Self {
        AgentError::ExternalCall(error.into())
    }
}
