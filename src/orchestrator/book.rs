//! The signal→orders table.
//!
//! Groups are handed out as `Arc<Mutex<_>>` so every mutation of one
//! signal's orders is serialized through its own lock while other
//! signals proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{ManagedOrder, OrderState, Signal};

/// All managed orders of one signal, plus the group-level break-even
/// latch.
#[derive(Debug)]
pub struct SignalGroup {
    pub signal: Signal,
    pub orders: Vec<ManagedOrder>,
    /// Set once every open order has had its stop moved to entry;
    /// further break-even triggers for the group are ignored.
    pub break_even_applied: bool,
}

impl SignalGroup {
    pub fn new(signal: Signal) -> Self {
        Self { signal, orders: Vec::new(), break_even_applied: false }
    }

    /// Whether the group still qualifies for break-even monitoring.
    pub fn break_even_eligible(&self) -> bool {
        !self.break_even_applied
            && self.orders.iter().any(|o| {
                matches!(o.state, OrderState::Working | OrderState::BreakEvenApplied)
            })
    }

    /// Price level that triggers break-even for this group: the
    /// configured target's value, falling back to the first capped one.
    pub fn trigger_price(&self, target_index: u8) -> Option<f64> {
        self.signal
            .targets
            .iter()
            .find(|t| t.index == target_index)
            .and_then(|t| t.value.level())
            .or_else(|| self.signal.tp1())
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.is_open()).count()
    }
}

/// Owner of every signal group for the engine's lifetime.
#[derive(Debug, Default)]
pub struct SignalBook {
    groups: RwLock<HashMap<Uuid, Arc<Mutex<SignalGroup>>>>,
}

impl SignalBook {
    pub fn new() -> Self {
        Self { groups: RwLock::new(HashMap::new()) }
    }

    pub async fn insert(&self, group: SignalGroup) -> Arc<Mutex<SignalGroup>> {
        let id = group.signal.id;
        let handle = Arc::new(Mutex::new(group));
        self.groups.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, signal_id: Uuid) -> Option<Arc<Mutex<SignalGroup>>> {
        self.groups.read().await.get(&signal_id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<Mutex<SignalGroup>>> {
        self.groups.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.groups.read().await.len()
    }
}
