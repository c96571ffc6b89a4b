//! Tradier API Client
//!
//! HTTP client for the Tradier brokerage REST API with bearer-token
//! authentication. Implements the [`Broker`] trait: every call returns a
//! typed [`BrokerError`] instead of raising past the boundary, and no
//! call is retried automatically.

use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::trading_core::broker::{
    Broker, BrokerError, OptionQuote, OrderAck, OrderRequest, Position,
};

use super::models::*;

/// Tradier API client
pub struct TradierClient {
    client: Client,
    base_url: String,
    access_token: String,
    account_id: String,
}

impl TradierClient {
    /// Create a new client from the injected configuration.
    ///
    /// The per-call timeout is set on the underlying HTTP client, so a
    /// hung brokerage call surfaces as [`BrokerError::Unavailable`]
    /// instead of stalling the pipeline.
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
            account_id: config.account_id.clone(),
        }
    }

    /// Get the authorization header value
    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Make an authenticated GET request and parse the JSON response.
    ///
    /// Transport failures, non-2xx statuses, and unparseable bodies all
    /// map to `Unavailable`: for read endpoints a retry could plausibly
    /// succeed, but retrying is the caller's decision.
    async fn get<R: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<R, BrokerError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("GET {endpoint} failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BrokerError::Unavailable(format!(
                "GET {endpoint} failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            BrokerError::Unavailable(format!("unparseable response from {endpoint}: {e}"))
        })
    }

    /// Form parameters for the order endpoint.
    ///
    /// Every order this system places is a market day order on an option
    /// contract; Tradier additionally wants the underlying ticker, which
    /// is recovered from the OCC symbol.
    fn order_form(order: &OrderRequest) -> Vec<(&'static str, String)> {
        vec![
            ("class", "option".to_string()),
            ("symbol", occ_underlying(&order.option_symbol).to_string()),
            ("option_symbol", order.option_symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("quantity", order.quantity.to_string()),
            ("type", "market".to_string()),
            ("duration", "day".to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl Broker for TradierClient {
    async fn underlying_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        debug!("Fetching quote for {}", symbol);

        let envelope: QuotesEnvelope = self
            .get(&format!("/markets/quotes?symbols={symbol}"))
            .await?;

        envelope
            .into_quotes()
            .into_iter()
            .find(|q| q.symbol == symbol)
            .and_then(|q| q.last)
            .ok_or_else(|| {
                BrokerError::Unavailable(format!("no last trade price returned for {symbol}"))
            })
    }

    async fn option_quote(&self, option_symbol: &str) -> Result<OptionQuote, BrokerError> {
        debug!("Fetching option quote for {}", option_symbol);

        let envelope: QuotesEnvelope = self
            .get(&format!("/markets/quotes?symbols={option_symbol}"))
            .await?;

        // An unlisted contract comes back with no quote rows; sizing still
        // has its fixed fallback, so an empty quote is not an error here.
        let quote = envelope
            .into_quotes()
            .into_iter()
            .find(|q| q.symbol == option_symbol);
        Ok(match quote {
            Some(q) => OptionQuote {
                bid: q.bid,
                ask: q.ask,
                last: q.last,
            },
            None => OptionQuote {
                bid: None,
                ask: None,
                last: None,
            },
        })
    }

    async fn cash_available(&self) -> Result<f64, BrokerError> {
        debug!("Fetching balances for account {}", self.account_id);

        let envelope: BalancesEnvelope = self
            .get(&format!("/accounts/{}/balances", self.account_id))
            .await?;

        envelope
            .available_cash()
            .ok_or(BrokerError::FieldMissing("cash_available"))
    }

    async fn open_positions(&self) -> Result<Vec<Position>, BrokerError> {
        debug!("Fetching positions for account {}", self.account_id);

        let envelope: PositionsEnvelope = self
            .get(&format!("/accounts/{}/positions", self.account_id))
            .await?;

        let positions = envelope.into_positions();
        debug!("Found {} open position(s)", positions.len());
        Ok(positions)
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerError> {
        info!(
            "Placing market order: {} {} {} @ MKT",
            order.side, order.quantity, order.option_symbol
        );

        let endpoint = format!("/accounts/{}/orders", self.account_id);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .form(&Self::order_form(order))
            .send()
            .await
            .map_err(|e| BrokerError::Unavailable(format!("POST {endpoint} failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BrokerError::Rejected(format!(
                "POST {endpoint} failed ({status}): {body}"
            )));
        }

        let envelope: OrderEnvelope = serde_json::from_str(&body)
            .map_err(|_| BrokerError::Rejected(format!("unparseable order response: {body}")))?;

        let ack = envelope
            .order
            .ok_or_else(|| BrokerError::Rejected(format!("order response missing id: {body}")))?;

        info!("Market order placed: ID {}", ack.id);
        Ok(OrderAck {
            id: ack.id,
            raw: body,
        })
    }
}
