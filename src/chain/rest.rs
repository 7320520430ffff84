//! Market gateway REST client
//!
//! HTTP boundary to the market SDK gateway. Requests carry a timestamped
//! HMAC-SHA256 signature when credentials are configured; an unauthenticated
//! client works against a local gateway. Gateway error codes map onto the
//! typed taxonomy so callers can branch on settlement-window violations.

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

use super::types::{CreatedMarket, MarketInfo, MarketPrices, TxReceipt};
use super::ChainClient;
use crate::error::{AgentError, Result};
use crate::types::{CollateralToken, Outcome};

/// Gateway error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
    token_id: String,
}

#[derive(Debug, Deserialize)]
struct ResolvedBody {
    resolved: bool,
}

/// REST client for the market gateway.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        chain_id: u64,
        timeout_ms: u64,
        api_key: Option<String>,
        api_secret: Option<String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-CHAIN-ID",
            HeaderValue::from_str(&chain_id.to_string())
                .map_err(|e| AgentError::external(anyhow!("invalid chain id header: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(AgentError::external)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        })
    }

    fn resolve_env(var_names: &[&str]) -> Option<String> {
        for var in var_names {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }

    fn credentials(&self) -> Option<(String, String)> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| Self::resolve_env(&["MARKET_GATEWAY_API_KEY", "GATEWAY_API_KEY"]))?;
        let api_secret = self
            .api_secret
            .clone()
            .or_else(|| Self::resolve_env(&["MARKET_GATEWAY_API_SECRET", "GATEWAY_API_SECRET"]))?;
        Some((api_key, api_secret))
    }

    /// Signature headers over `timestamp + METHOD + path + body`.
    fn signed_headers(&self, method: &str, request_path: &str, body: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let Some((api_key, api_secret)) = self.credentials() else {
            // Unauthenticated gateway (local development node).
            return Ok(headers);
        };

        let timestamp = Utc::now().timestamp().to_string();
        let message = format!(
            "{}{}{}{}",
            timestamp,
            method.to_uppercase(),
            request_path,
            body
        );

        let secret_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(&api_secret)
            .or_else(|_| general_purpose::URL_SAFE.decode(&api_secret))
            .map_err(|e| {
                AgentError::external(anyhow!(
                    "failed to decode MARKET_GATEWAY_API_SECRET as url-safe base64: {e}"
                ))
            })?;

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(&secret_bytes)
            .map_err(|e| AgentError::external(anyhow!("failed to initialize HMAC: {e}")))?;
        mac.update(message.as_bytes());
        let signature = general_purpose::URL_SAFE.encode(mac.finalize().into_bytes());

        headers.insert(
            "GATEWAY_API_KEY",
            HeaderValue::from_str(&api_key)
                .map_err(|e| AgentError::external(anyhow!("invalid api key header: {e}")))?,
        );
        headers.insert(
            "GATEWAY_SIGNATURE",
            HeaderValue::from_str(&signature)
                .map_err(|e| AgentError::external(anyhow!("invalid signature header: {e}")))?,
        );
        headers.insert(
            "GATEWAY_TIMESTAMP",
            HeaderValue::from_str(&timestamp)
                .map_err(|e| AgentError::external(anyhow!("invalid timestamp header: {e}")))?,
        );
        Ok(headers)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        condition_id: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let body_text = body.map(|v| v.to_string()).unwrap_or_default();
        let headers = self.signed_headers(method.as_str(), path, &body_text)?;

        let mut request = self.client.request(method, &url).headers(headers);
        if !body_text.is_empty() {
            request = request.body(body_text);
        }

        let response = request.send().await.map_err(|e| {
            AgentError::external(anyhow::Error::new(e).context(format!("request to {url} failed")))
        })?;
        let status = response.status();
        let text = response.text().await.map_err(AgentError::external)?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text, condition_id));
        }

        serde_json::from_str(&text).map_err(|e| {
            AgentError::external(anyhow!("invalid gateway response from {url}: {e}"))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, condition_id: &str) -> Result<T> {
        self.request(Method::GET, path, None, condition_id).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        condition_id: &str,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(body), condition_id)
            .await
    }

    fn map_error(status: StatusCode, body: &str, condition_id: &str) -> AgentError {
        if let Ok(parsed) = serde_json::from_str::<GatewayErrorBody>(body) {
            let detail = parsed.error;
            return match detail.code.as_str() {
                "ALREADY_SETTLED" => AgentError::AlreadySettledOnChain(condition_id.to_string()),
                "NOT_SETTLEABLE" => AgentError::NotYetSettleable(condition_id.to_string()),
                "MARKET_NOT_FOUND" => AgentError::NotFound(condition_id.to_string()),
                _ => AgentError::external(anyhow!(
                    "gateway error {}: {} ({})",
                    status,
                    detail.message,
                    detail.code
                )),
            };
        }
        AgentError::external(anyhow!("gateway error {}: {}", status, body))
    }
}

#[async_trait]
impl ChainClient for GatewayClient {
    async fn create_market(
        &self,
        question: &str,
        end_time: i64,
        initial_liquidity: Decimal,
        collateral: &CollateralToken,
    ) -> Result<CreatedMarket> {
        let body = json!({
            "question": question,
            "endTime": end_time,
            "initialLiquidity": initial_liquidity,
            "collateralToken": collateral.address,
        });
        self.post("/markets", body, "").await
    }

    async fn get_market_info(&self, condition_id: &str) -> Result<MarketInfo> {
        self.get(&format!("/markets/{condition_id}"), condition_id)
            .await
    }

    async fn get_market_prices(&self, condition_id: &str) -> Result<MarketPrices> {
        self.get(&format!("/markets/{condition_id}/prices"), condition_id)
            .await
    }

    async fn buy(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt> {
        let body = json!({ "amount": amount, "outcome": outcome, "minOut": min_out });
        self.post(&format!("/markets/{condition_id}/buy"), body, condition_id)
            .await
    }

    async fn sell(
        &self,
        condition_id: &str,
        amount: Decimal,
        outcome: Outcome,
        min_out: Decimal,
    ) -> Result<TxReceipt> {
        let body = json!({ "amount": amount, "outcome": outcome, "minOut": min_out });
        self.post(&format!("/markets/{condition_id}/sell"), body, condition_id)
            .await
    }

    async fn is_resolved(&self, condition_id: &str) -> Result<bool> {
        let body: ResolvedBody = self
            .get(&format!("/markets/{condition_id}/resolved"), condition_id)
            .await?;
        Ok(body.resolved)
    }

    async fn get_winning_token(&self, condition_id: &str) -> Result<String> {
        let body: TokenBody = self
            .get(
                &format!("/markets/{condition_id}/winning-token"),
                condition_id,
            )
            .await?;
        Ok(body.token_id)
    }

    async fn get_token_id(&self, condition_id: &str, outcome: Outcome) -> Result<String> {
        let body: TokenBody = self
            .get(
                &format!("/markets/{condition_id}/tokens/{outcome}"),
                condition_id,
            )
            .await?;
        Ok(body.token_id)
    }

    async fn settle_market(
        &self,
        condition_id: &str,
        winning_token_id: &str,
    ) -> Result<TxReceipt> {
        let body = json!({ "winningTokenId": winning_token_id });
        self.post(&format!("/markets/{condition_id}/settle"), body, condition_id)
            .await
    }

    async fn redeem(&self, condition_id: &str) -> Result<TxReceipt> {
        self.post(&format!("/markets/{condition_id}/redeem"), json!({}), condition_id)
            .await
    }
}
