//! In-memory execution platform for dry runs and tests.
//!
//! Fills market orders immediately, parks limit orders as pending, and
//! records every call so behavior can be asserted on. Failure injection
//! covers the two error classes the orchestrator must distinguish.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::broker::{ExecutionPlatform, OrderRequest, PositionState};
use crate::error::{ModificationError, PlacementError, StaleDataError};
use crate::models::{Direction, OrderKind};

#[derive(Debug)]
struct PaperOrder {
    state: PositionState,
}

#[derive(Debug, Default)]
struct PaperState {
    next_ticket: u64,
    prices: HashMap<String, f64>,
    orders: HashMap<u64, PaperOrder>,
    placed: Vec<OrderRequest>,
    stop_modifications: Vec<(u64, f64)>,
    cancellations: Vec<u64>,
    transient_failures_left: u32,
    reject_reason: Option<String>,
    clock_offset_secs: i64,
}

#[derive(Debug, Default)]
pub struct PaperPlatform {
    state: Mutex<PaperState>,
}

impl PaperPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.state.lock().unwrap().prices.insert(symbol.to_string(), price);
    }

    pub fn set_clock_offset_secs(&self, secs: i64) {
        self.state.lock().unwrap().clock_offset_secs = secs;
    }

    /// Next `count` placements fail with a transport error before the
    /// platform accepts orders again.
    pub fn inject_transient_failures(&self, count: u32) {
        self.state.lock().unwrap().transient_failures_left = count;
    }

    /// All subsequent placements are rejected with a business error.
    pub fn reject_placements(&self, reason: &str) {
        self.state.lock().unwrap().reject_reason = Some(reason.to_string());
    }

    /// Mark a pending ticket as filled.
    pub fn fill(&self, ticket: u64) {
        if let Some(order) = self.state.lock().unwrap().orders.get_mut(&ticket) {
            order.state = PositionState::Open;
        }
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().placed.clone()
    }

    pub fn stop_modifications(&self) -> Vec<(u64, f64)> {
        self.state.lock().unwrap().stop_modifications.clone()
    }

    pub fn cancellations(&self) -> Vec<u64> {
        self.state.lock().unwrap().cancellations.clone()
    }
}

#[async_trait::async_trait]
impl ExecutionPlatform for PaperPlatform {
    async fn place_order(&self, request: &OrderRequest) -> Result<u64, PlacementError> {
        let mut state = self.state.lock().unwrap();

        if state.transient_failures_left > 0 {
            state.transient_failures_left -= 1;
            return Err(PlacementError::Transport("injected transport failure".into()));
        }
        if let Some(reason) = &state.reject_reason {
            return Err(PlacementError::Rejected(reason.clone()));
        }

        state.next_ticket += 1;
        let ticket = state.next_ticket;
        let position_state = match request.kind {
            OrderKind::Market => PositionState::Open,
            OrderKind::Limit => PositionState::Pending,
            OrderKind::Cancelled => {
                return Err(PlacementError::Rejected("cancelled order submitted".into()))
            }
        };
        state.orders.insert(ticket, PaperOrder { state: position_state });
        state.placed.push(request.clone());
        Ok(ticket)
    }

    async fn modify_stop_loss(
        &self,
        ticket: u64,
        new_stop_loss: f64,
    ) -> Result<(), ModificationError> {
        let mut state = self.state.lock().unwrap();
        if !state.orders.contains_key(&ticket) {
            return Err(ModificationError::Rejected(format!("unknown ticket {}", ticket)));
        }
        state.stop_modifications.push((ticket, new_stop_loss));
        Ok(())
    }

    async fn cancel_order(&self, ticket: u64) -> Result<(), ModificationError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .get_mut(&ticket)
            .ok_or_else(|| ModificationError::Rejected(format!("unknown ticket {}", ticket)))?;
        order.state = PositionState::Closed;
        state.cancellations.push(ticket);
        Ok(())
    }

    async fn get_position(&self, ticket: u64) -> Result<PositionState, StaleDataError> {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(&ticket)
            .map(|o| o.state)
            .ok_or(StaleDataError::PositionUnavailable(ticket))
    }

    async fn get_price(
        &self,
        symbol: &str,
        _direction: Direction,
    ) -> Result<f64, StaleDataError> {
        self.state
            .lock()
            .unwrap()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| StaleDataError::PriceUnavailable(symbol.to_string()))
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>, StaleDataError> {
        let offset = self.state.lock().unwrap().clock_offset_secs;
        Ok(Utc::now() + Duration::seconds(offset))
    }
}
