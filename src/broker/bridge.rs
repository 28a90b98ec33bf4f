//! HTTP client for a MetaTrader REST bridge.
//!
//! The bridge terminal owns authentication and raw order transport; this
//! client only speaks its JSON API. Requests are rate limited so a burst
//! of targets never trips the bridge's flood control.

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::broker::{ExecutionPlatform, OrderRequest, PositionState};
use crate::error::{ModificationError, PlacementError, StaleDataError};
use crate::models::{Direction, OrderKind};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_RPS: u32 = 10;

// Type alias for the rate limiter to simplify signatures
type BridgeRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// REST bridge client. Cloneable; all clones share the rate limiter.
#[derive(Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BridgeRateLimiter>,
}

#[derive(Debug, Serialize)]
struct PlaceOrderBody<'a> {
    kind: &'a str,
    symbol: &'a str,
    direction: &'a str,
    price: f64,
    stop_loss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<f64>,
    comment: &'a str,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    ticket: u64,
}

#[derive(Debug, Serialize)]
struct ModifyStopLossBody {
    stop_loss: f64,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
struct TimeResponse {
    server_time: DateTime<Utc>,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client");

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn kind_str(kind: OrderKind) -> &'static str {
        match kind {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
            OrderKind::Cancelled => unreachable!("cancelled orders are never submitted"),
        }
    }

    fn direction_str(direction: Direction) -> &'static str {
        match direction {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

#[async_trait::async_trait]
impl ExecutionPlatform for BridgeClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<u64, PlacementError> {
        self.rate_limiter.until_ready().await;

        let body = PlaceOrderBody {
            kind: Self::kind_str(request.kind),
            symbol: &request.symbol,
            direction: Self::direction_str(request.direction),
            price: request.price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            comment: &request.comment,
            expires_at: request.expires_at,
        };

        let response = self
            .client
            .post(self.url("/orders"))
            .json(&body)
            .send()
            .await
            .map_err(|e| PlacementError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // Business rejection (invalid price, market closed); never retried
            let reason = response.text().await.unwrap_or_default();
            return Err(PlacementError::Rejected(format!("{}: {}", status, reason)));
        }
        if !status.is_success() {
            return Err(PlacementError::Transport(format!("bridge returned {}", status)));
        }

        let parsed: PlaceOrderResponse = response
            .json()
            .await
            .map_err(|e| PlacementError::Transport(e.to_string()))?;
        Ok(parsed.ticket)
    }

    async fn modify_stop_loss(
        &self,
        ticket: u64,
        new_stop_loss: f64,
    ) -> Result<(), ModificationError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(self.url(&format!("/orders/{}/stop_loss", ticket)))
            .json(&ModifyStopLossBody { stop_loss: new_stop_loss })
            .send()
            .await
            .map_err(|e| ModificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ModificationError::Rejected(format!("{}: {}", status, reason)));
        }
        if !status.is_success() {
            return Err(ModificationError::Transport(format!("bridge returned {}", status)));
        }
        Ok(())
    }

    async fn cancel_order(&self, ticket: u64) -> Result<(), ModificationError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .delete(self.url(&format!("/orders/{}", ticket)))
            .send()
            .await
            .map_err(|e| ModificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ModificationError::Rejected(format!("{}: {}", status, reason)));
        }
        if !status.is_success() {
            return Err(ModificationError::Transport(format!("bridge returned {}", status)));
        }
        Ok(())
    }

    async fn get_position(&self, ticket: u64) -> Result<PositionState, StaleDataError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(self.url(&format!("/positions/{}", ticket)))
            .send()
            .await
            .map_err(|_| StaleDataError::PositionUnavailable(ticket))?;

        if !response.status().is_success() {
            return Err(StaleDataError::PositionUnavailable(ticket));
        }

        let parsed: PositionResponse = response
            .json()
            .await
            .map_err(|_| StaleDataError::PositionUnavailable(ticket))?;

        match parsed.status.as_str() {
            "pending" => Ok(PositionState::Pending),
            "open" => Ok(PositionState::Open),
            "closed" => Ok(PositionState::Closed),
            other => {
                tracing::warn!("Unknown position status '{}' for ticket {}", other, ticket);
                Err(StaleDataError::PositionUnavailable(ticket))
            }
        }
    }

    async fn get_price(
        &self,
        symbol: &str,
        direction: Direction,
    ) -> Result<f64, StaleDataError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(self.url(&format!("/price/{}", symbol)))
            .send()
            .await
            .map_err(|_| StaleDataError::PriceUnavailable(symbol.to_string()))?;

        if !response.status().is_success() {
            return Err(StaleDataError::PriceUnavailable(symbol.to_string()));
        }

        let parsed: PriceResponse = response
            .json()
            .await
            .map_err(|_| StaleDataError::PriceUnavailable(symbol.to_string()))?;

        // Ask for buy, bid for sell
        let price = match direction {
            Direction::Buy => parsed.ask,
            Direction::Sell => parsed.bid,
        };
        if price == 0.0 {
            tracing::warn!(
                "Zero price for {} (bid={}, ask={})",
                symbol,
                parsed.bid,
                parsed.ask
            );
            return Err(StaleDataError::PriceUnavailable(symbol.to_string()));
        }
        Ok(price)
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>, StaleDataError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(self.url("/time"))
            .send()
            .await
            .map_err(|e| StaleDataError::ServerTimeUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StaleDataError::ServerTimeUnavailable(format!(
                "bridge returned {}",
                response.status()
            )));
        }

        let parsed: TimeResponse = response
            .json()
            .await
            .map_err(|e| StaleDataError::ServerTimeUnavailable(e.to_string()))?;
        Ok(parsed.server_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_request() -> OrderRequest {
        OrderRequest {
            kind: OrderKind::Market,
            symbol: "XAUUSD+".to_string(),
            direction: Direction::Buy,
            price: 3600.0,
            stop_loss: 3592.0,
            take_profit: Some(3602.0),
            comment: "ab12cd34/1/3602".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_place_order_returns_ticket() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ticket": 42001}"#)
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let ticket = client.place_order(&sample_request()).await.unwrap();

        assert_eq!(ticket, 42001);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_place_order_client_error_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/orders")
            .with_status(422)
            .with_body("invalid price")
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let err = client.place_order(&sample_request()).await.unwrap_err();

        assert!(!err.is_transient());
        assert!(err.to_string().contains("invalid price"));
    }

    #[tokio::test]
    async fn test_place_order_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/orders")
            .with_status(502)
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let err = client.place_order(&sample_request()).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_get_price_uses_ask_for_buy_bid_for_sell() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/price/XAUUSD+")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bid": 3600.1, "ask": 3600.4}"#)
            .expect(2)
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let ask = client.get_price("XAUUSD+", Direction::Buy).await.unwrap();
        let bid = client.get_price("XAUUSD+", Direction::Sell).await.unwrap();

        assert_eq!(ask, 3600.4);
        assert_eq!(bid, 3600.1);
    }

    #[tokio::test]
    async fn test_get_position_maps_states() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/positions/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "open"}"#)
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let state = client.get_position(7).await.unwrap();
        assert_eq!(state, PositionState::Open);
    }

    #[tokio::test]
    async fn test_modify_stop_loss_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/orders/7/stop_loss")
            .with_status(400)
            .with_body("too close to market")
            .create_async()
            .await;

        let client = BridgeClient::new(server.url());
        let err = client.modify_stop_loss(7, 3600.0).await.unwrap_err();
        assert!(matches!(err, ModificationError::Rejected(_)));
    }
}
