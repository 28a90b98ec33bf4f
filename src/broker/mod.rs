// Execution platform interface and implementations
pub mod bridge;
pub mod clock;
pub mod paper;

pub use bridge::BridgeClient;
pub use clock::ServerClock;
pub use paper::PaperPlatform;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ModificationError, PlacementError, StaleDataError};
use crate::models::{Direction, OrderKind};

/// Everything submitted to the platform for one order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Market or Limit; Cancelled orders are never submitted
    pub kind: OrderKind,
    pub symbol: String,
    pub direction: Direction,
    /// Entry price for pending orders; ignored for market orders
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub comment: String,
    pub expires_at: DateTime<Utc>,
}

/// Broker-side view of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    /// Pending order accepted, not yet filled
    Pending,
    /// Filled, live position
    Open,
    /// Ticket no longer exists (filled-and-closed, cancelled, stopped out)
    Closed,
}

/// The execution platform as the engine sees it.
///
/// All calls are potentially blocking network operations; callers must
/// never hold more than one signal group locked across them.
#[async_trait]
pub trait ExecutionPlatform: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> Result<u64, PlacementError>;

    async fn modify_stop_loss(
        &self,
        ticket: u64,
        new_stop_loss: f64,
    ) -> Result<(), ModificationError>;

    /// Cancels a pending order, or closes the position if the ticket has
    /// already filled.
    async fn cancel_order(&self, ticket: u64) -> Result<(), ModificationError>;

    async fn get_position(&self, ticket: u64) -> Result<PositionState, StaleDataError>;

    /// Current market price: ask for Buy, bid for Sell.
    async fn get_price(&self, symbol: &str, direction: Direction)
        -> Result<f64, StaleDataError>;

    async fn get_server_time(&self) -> Result<DateTime<Utc>, StaleDataError>;
}
