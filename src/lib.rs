//! MarketBot Library
//!
//! Prediction-market creation and settlement agent with a durable local
//! registry. Market mathematics lives behind the chain gateway; this crate
//! owns the registry files, the due-settlement scan, and the workflow
//! sequencing around them.

pub mod chain;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod persistence;
pub mod registry;
pub mod scanner;
pub mod types;
