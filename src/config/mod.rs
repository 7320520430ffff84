//! Configuration management for MarketBot
//!
//! Loads from coded defaults, optional config files and environment
//! variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::CollateralToken;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub chain: ChainConfig,
    pub registry: RegistryConfig,
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub collateral: CollateralConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Agent version tag for logging
    pub tag: String,
    /// Dry run mode: scan and report due markets, never call the chain
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Market gateway endpoint
    pub gateway_url: String,
    /// Chain id the gateway operates on
    pub chain_id: u64,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding registry.json and the per-market records
    pub data_dir: String,
    /// Enable the CSV audit trail
    pub audit_enabled: bool,
    /// Directory for audit CSVs
    pub audit_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between settlement scans
    pub interval_secs: u64,
    /// Minimum winning share (percent) the price judge needs for a verdict
    pub price_threshold_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollateralConfig {
    /// Tokens accepted by symbol at creation time
    pub tokens: Vec<CollateralToken>,
}

impl Default for CollateralConfig {
    fn default() -> Self {
        Self {
            tokens: vec![CollateralToken {
                // USDC on Polygon
                symbol: "USDC".to_string(),
                address: "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".to_string(),
                decimals: 6,
            }],
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.dry_run", true)?
            // Chain defaults
            .set_default("chain.gateway_url", "http://localhost:8080")?
            .set_default("chain.chain_id", 137)?
            .set_default("chain.request_timeout_ms", 30_000)?
            // Registry defaults
            .set_default("registry.data_dir", "./markets")?
            .set_default("registry.audit_enabled", true)?
            .set_default("registry.audit_dir", "./data/audit")?
            // Scanner defaults
            .set_default("scanner.interval_secs", 60)?
            .set_default("scanner.price_threshold_pct", 95.0)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (MARKETBOT_*)
            .add_source(Environment::with_prefix("MARKETBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "bot={} gateway={} data_dir={} dry_run={} scan_interval={}s",
            self.bot.tag,
            self.chain.gateway_url,
            self.registry.data_dir,
            self.bot.dry_run,
            self.scanner.interval_secs
        )
    }

    /// Validate required environment variables. Live mode signs gateway
    /// requests, so it needs credentials; dry run does not.
    pub fn validate_env(&self) -> Result<()> {
        if self.bot.dry_run {
            return Ok(());
        }
        for var in ["MARKET_GATEWAY_API_KEY", "MARKET_GATEWAY_API_SECRET"] {
            if std::env::var(var).is_err() {
                bail!("Required environment variable {} is not set", var);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
