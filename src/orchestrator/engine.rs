//! Order orchestration: places, tracks, expires and closes every order
//! a signal produces. All mutations of a signal group happen here,
//! under that group's lock.

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::broker::{ExecutionPlatform, OrderRequest, PositionState, ServerClock};
use crate::config::ExpiryPolicy;
use crate::decision::{decide, OrderDecision, Tolerance};
use crate::error::PlacementError;
use crate::models::{Direction, ManagedOrder, OrderKind, OrderState, Signal};
use crate::orchestrator::{SignalBook, SignalGroup};
use crate::symbols::SymbolMapper;

const MAX_PLACEMENT_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Stop-loss values closer to entry than this are considered already at
/// break-even.
const BE_EPSILON: f64 = 1e-9;

/// A signal group the monitor should watch for its break-even trigger.
#[derive(Debug, Clone)]
pub struct BreakEvenCandidate {
    pub signal_id: Uuid,
    /// Broker-specific symbol, ready for price lookups
    pub symbol: String,
    pub direction: Direction,
    pub trigger: f64,
}

pub struct Orchestrator {
    platform: Arc<dyn ExecutionPlatform>,
    clock: Arc<ServerClock>,
    book: SignalBook,
    mapper: SymbolMapper,
    broker_name: String,
    tolerance: Tolerance,
    expiry: ExpiryPolicy,
}

impl Orchestrator {
    pub fn new(
        platform: Arc<dyn ExecutionPlatform>,
        clock: Arc<ServerClock>,
        mapper: SymbolMapper,
        broker_name: String,
        tolerance: Tolerance,
        expiry: ExpiryPolicy,
    ) -> Self {
        Self {
            platform,
            clock,
            book: SignalBook::new(),
            mapper,
            broker_name,
            tolerance,
            expiry,
        }
    }

    pub fn book(&self) -> &SignalBook {
        &self.book
    }

    fn broker_symbol(&self, canonical: &str) -> String {
        self.mapper.broker_symbol(canonical, &self.broker_name)
    }

    /// Place one order per target of a freshly parsed signal.
    ///
    /// Returns the number of orders accepted by the platform. Errors
    /// local to one order never abort the remaining targets.
    pub async fn on_new_signal(&self, signal: Signal) -> crate::Result<usize> {
        let broker_symbol = self.broker_symbol(&signal.symbol);
        let current_price = self
            .platform
            .get_price(&broker_symbol, signal.direction)
            .await?;

        let decision = decide(&signal, current_price, self.tolerance);
        tracing::info!(
            "Signal {} ({}): price {:.2} vs entry {:.2} / SL {:.2} -> {:?}",
            signal.short_id(),
            broker_symbol,
            current_price,
            signal.entry_price,
            signal.stop_loss,
            decision
        );

        // The group goes into the book first and stays locked for the
        // whole placement pass, so commands arriving mid-placement wait
        // on the group lock instead of seeing half a signal.
        let handle = self.book.insert(SignalGroup::new(signal.clone())).await;
        let mut group = handle.lock().await;

        // TP1 value is baked into every comment so broker-side events
        // can be attributed without our in-memory state.
        let tp1 = signal.tp1().unwrap_or_else(|| {
            signal.entry_price + signal.direction.sign() * 2.0
        });

        if decision == OrderDecision::Cancel {
            for target in &signal.targets {
                group.orders.push(ManagedOrder {
                    signal_id: signal.id,
                    target_index: target.index,
                    kind: OrderKind::Cancelled,
                    state: OrderState::Closed,
                    broker_ticket: None,
                    entry_price: signal.entry_price,
                    stop_loss: signal.stop_loss,
                    take_profit: target.value.level(),
                    comment: order_comment(&signal, target.index, tp1),
                    expires_at: self.clock.now_server(),
                });
            }
            tracing::warn!(
                "Signal {} rejected: price {:.2} already beyond stop {:.2}, no orders placed",
                signal.short_id(),
                current_price,
                signal.stop_loss
            );
            return Ok(0);
        }

        let (kind, price) = match decision {
            OrderDecision::Market => (OrderKind::Market, current_price),
            OrderDecision::Limit(entry) => (OrderKind::Limit, entry),
            OrderDecision::Cancel => unreachable!(),
        };

        let expiry_secs = self.expiry.seconds_for(signal.source_format);
        let mut placed = 0;
        for target in &signal.targets {
            let comment = order_comment(&signal, target.index, tp1);
            let expires_at = self.clock.expiry_from_now(expiry_secs);

            let request = OrderRequest {
                kind,
                symbol: broker_symbol.clone(),
                direction: signal.direction,
                price,
                stop_loss: signal.stop_loss,
                take_profit: target.value.level(),
                comment: comment.clone(),
                expires_at,
            };

            let mut order = ManagedOrder {
                signal_id: signal.id,
                target_index: target.index,
                kind,
                state: OrderState::Failed,
                broker_ticket: None,
                entry_price: signal.entry_price,
                stop_loss: signal.stop_loss,
                take_profit: target.value.level(),
                comment: comment.clone(),
                expires_at,
            };

            match self.place_with_retry(&request).await {
                Ok(ticket) => {
                    order.broker_ticket = Some(ticket);
                    order.state = match kind {
                        OrderKind::Market => OrderState::Working,
                        _ => OrderState::Pending,
                    };
                    placed += 1;
                    tracing::info!(
                        "Order placed: TP{} ticket {} comment {}",
                        target.index,
                        ticket,
                        comment
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Failed TP{} for signal {}: {} (continuing with remaining targets)",
                        target.index,
                        signal.short_id(),
                        e
                    );
                }
            }
            group.orders.push(order);
        }

        tracing::info!(
            "Signal {}: {}/{} orders placed",
            signal.short_id(),
            placed,
            signal.targets.len()
        );
        Ok(placed)
    }

    /// Bounded retry with exponential backoff, for transient transport
    /// errors only. Business rejections surface immediately.
    async fn place_with_retry(&self, request: &OrderRequest) -> Result<u64, PlacementError> {
        let mut last_error = None;

        for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
            match self.platform.place_order(request).await {
                Ok(ticket) => return Ok(ticket),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    last_error = Some(e);

                    if attempt < MAX_PLACEMENT_ATTEMPTS {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                            attempt,
                            MAX_PLACEMENT_ATTEMPTS,
                            request.comment,
                            last_error.as_ref().unwrap(),
                            backoff_ms
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        // All retries exhausted
        Err(last_error
            .unwrap_or_else(|| PlacementError::Transport("all retry attempts failed".into())))
    }

    /// Cancel every pending order past its expiration timestamp.
    /// Failures stay `Pending` and are retried next cycle.
    pub async fn expire_orders(&self) -> usize {
        let now = self.clock.now_server();
        let mut expired = 0;

        for handle in self.book.all().await {
            let mut group = handle.lock().await;
            for order in group.orders.iter_mut() {
                if order.state != OrderState::Pending || order.expires_at > now {
                    continue;
                }
                let Some(ticket) = order.broker_ticket else { continue };

                match self.platform.cancel_order(ticket).await {
                    Ok(()) => {
                        order.state = OrderState::Expired;
                        expired += 1;
                        tracing::info!(
                            "Order {} (ticket {}) expired and cancelled",
                            order.comment,
                            ticket
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to cancel expired ticket {}: {} (will retry next cycle)",
                            ticket,
                            e
                        );
                    }
                }
            }
        }
        expired
    }

    /// Refresh order states from the platform: pending orders that
    /// filled become working, tickets the platform no longer knows
    /// become closed.
    pub async fn sync_states(&self) {
        for handle in self.book.all().await {
            let mut group = handle.lock().await;
            for order in group.orders.iter_mut().filter(|o| o.is_open()) {
                let Some(ticket) = order.broker_ticket else { continue };

                match self.platform.get_position(ticket).await {
                    Ok(PositionState::Open) => {
                        if order.state == OrderState::Pending {
                            order.state = OrderState::Working;
                            tracing::info!("Limit order {} filled (ticket {})", order.comment, ticket);
                        }
                    }
                    Ok(PositionState::Closed) => {
                        order.state = OrderState::Closed;
                        tracing::info!("Order {} closed on platform (ticket {})", order.comment, ticket);
                    }
                    Ok(PositionState::Pending) => {}
                    Err(e) => {
                        tracing::debug!("Skipping state sync for ticket {}: {}", ticket, e);
                    }
                }
            }
        }
    }

    /// Move the stop-loss of every still-open order in the group to the
    /// signal's entry price. Idempotent: already-relocated orders are
    /// skipped, and once the whole group succeeds further calls are
    /// no-ops. Returns the number of modification calls that succeeded.
    pub async fn apply_break_even(&self, signal_id: Uuid) -> usize {
        let Some(handle) = self.book.get(signal_id).await else {
            tracing::warn!("Break-even requested for unknown signal {}", signal_id);
            return 0;
        };
        let mut group = handle.lock().await;

        if group.break_even_applied {
            return 0;
        }

        let entry = group.signal.entry_price;
        let mut modified = 0;
        let mut failures = false;

        for order in group.orders.iter_mut().filter(|o| o.is_open()) {
            if (order.stop_loss - entry).abs() < BE_EPSILON {
                continue; // already at entry
            }
            let Some(ticket) = order.broker_ticket else { continue };

            match self.platform.modify_stop_loss(ticket, entry).await {
                Ok(()) => {
                    order.stop_loss = entry;
                    if order.state == OrderState::Working {
                        order.state = OrderState::BreakEvenApplied;
                    }
                    modified += 1;
                    tracing::info!(
                        "Break-even applied to ticket {} (SL -> {:.2})",
                        ticket,
                        entry
                    );
                }
                Err(e) => {
                    failures = true;
                    tracing::error!(
                        "Failed to apply break-even to ticket {}: {} (retried next cycle)",
                        ticket,
                        e
                    );
                }
            }
        }

        if !failures {
            group.break_even_applied = true;
        }
        modified
    }

    /// Command-driven break-even. Same guarantees as the monitor path.
    pub async fn force_break_even(&self, signal_id: Uuid) -> usize {
        self.apply_break_even(signal_id).await
    }

    /// Close every open order of the signal. Idempotent; already-closed
    /// orders are skipped.
    pub async fn close_signal(&self, signal_id: Uuid) -> usize {
        self.close_matching(signal_id, None).await
    }

    /// Close the order for one target of the signal.
    pub async fn close_target(&self, signal_id: Uuid, target_index: u8) -> usize {
        self.close_matching(signal_id, Some(target_index)).await
    }

    async fn close_matching(&self, signal_id: Uuid, target_index: Option<u8>) -> usize {
        let Some(handle) = self.book.get(signal_id).await else {
            tracing::warn!("Close requested for unknown signal {}", signal_id);
            return 0;
        };
        let mut group = handle.lock().await;

        let mut closed = 0;
        for order in group.orders.iter_mut().filter(|o| o.is_open()) {
            if let Some(index) = target_index {
                if order.target_index != index {
                    continue;
                }
            }
            let Some(ticket) = order.broker_ticket else { continue };

            match self.platform.cancel_order(ticket).await {
                Ok(()) => {
                    order.state = OrderState::Closed;
                    closed += 1;
                    tracing::info!("Closed order {} (ticket {})", order.comment, ticket);
                }
                Err(e) => {
                    tracing::error!("Failed to close ticket {}: {}", ticket, e);
                }
            }
        }
        closed
    }

    /// Groups the break-even monitor should watch this cycle.
    pub async fn break_even_candidates(&self, target_index: u8) -> Vec<BreakEvenCandidate> {
        let mut candidates = Vec::new();
        for handle in self.book.all().await {
            let group = handle.lock().await;
            if !group.break_even_eligible() {
                continue;
            }
            if let Some(trigger) = group.trigger_price(target_index) {
                candidates.push(BreakEvenCandidate {
                    signal_id: group.signal.id,
                    symbol: self.broker_symbol(&group.signal.symbol),
                    direction: group.signal.direction,
                    trigger,
                });
            }
        }
        candidates
    }
}

fn order_comment(signal: &Signal, target_index: u8, tp1: f64) -> String {
    format!("{}/{}/{}", signal.short_id(), target_index, tp1.round() as i64)
}
