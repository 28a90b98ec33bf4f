use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1.0 for Buy, -1.0 for Sell; used to apply fixed target offsets
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

/// Message format variant, detected from structural cues in the raw text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceFormat {
    Icm,
    Fortune,
    Default,
}

/// A take-profit level. `Open` means the order runs without a price cap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TargetPrice {
    Level(f64),
    Open,
}

impl TargetPrice {
    pub fn level(&self) -> Option<f64> {
        match self {
            TargetPrice::Level(p) => Some(*p),
            TargetPrice::Open => None,
        }
    }
}

/// One take-profit target of a signal (index is 1-based)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub index: u8,
    pub value: TargetPrice,
}

/// Parsed trading signal. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub source_format: SourceFormat,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub targets: Vec<Target>,
    pub received_at: DateTime<Utc>,
}

impl Signal {
    /// First capped target value; drives break-even triggering and the
    /// order comment.
    pub fn tp1(&self) -> Option<f64> {
        self.targets.iter().find_map(|t| t.value.level())
    }

    /// Short stable id used in broker comments (comment fields are
    /// length-limited on most platforms).
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// How an order was (or was not) submitted to the platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderKind {
    /// Executed immediately at current price
    Market,
    /// Pending at the signal's entry price; may expire unfilled
    Limit,
    /// Decided away before submission (price already breached the stop)
    Cancelled,
}

/// Lifecycle state of a managed order.
///
/// Terminal states (`Closed`, `Expired`, `Failed`) are never left again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderState {
    /// Limit order accepted by the platform, awaiting fill
    Pending,
    /// Live position
    Working,
    /// Live position with stop-loss relocated to entry
    BreakEvenApplied,
    Closed,
    Expired,
    Failed,
}

/// An order the orchestrator placed (or decided not to place) for one
/// target of one signal. The orchestrator is the sole mutator of `state`
/// and `stop_loss`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedOrder {
    pub signal_id: Uuid,
    pub target_index: u8,
    pub kind: OrderKind,
    pub state: OrderState,
    pub broker_ticket: Option<u64>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    /// Unique per order: short signal id / target index / TP1 value.
    /// Lets every broker-side event be attributed back to exactly one
    /// (signal, target) pair.
    pub comment: String,
    pub expires_at: DateTime<Utc>,
}

impl ManagedOrder {
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            OrderState::Pending | OrderState::Working | OrderState::BreakEvenApplied
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            OrderState::Closed | OrderState::Expired | OrderState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            source_format: SourceFormat::Default,
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 3600.0,
            stop_loss: 3592.0,
            targets: vec![
                Target { index: 1, value: TargetPrice::Level(3602.0) },
                Target { index: 2, value: TargetPrice::Level(3604.0) },
                Target { index: 3, value: TargetPrice::Level(3606.0) },
                Target { index: 4, value: TargetPrice::Open },
            ],
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_tp1_skips_open_targets() {
        let mut signal = sample_signal();
        assert_eq!(signal.tp1(), Some(3602.0));

        signal.targets = vec![Target { index: 1, value: TargetPrice::Open }];
        assert_eq!(signal.tp1(), None);
    }

    #[test]
    fn test_short_id_is_eight_chars() {
        let signal = sample_signal();
        assert_eq!(signal.short_id().len(), 8);
        assert!(signal.id.simple().to_string().starts_with(&signal.short_id()));
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Buy.sign(), 1.0);
        assert_eq!(Direction::Sell.sign(), -1.0);
    }

    #[test]
    fn test_order_state_classification() {
        let mut order = ManagedOrder {
            signal_id: Uuid::new_v4(),
            target_index: 1,
            kind: OrderKind::Market,
            state: OrderState::Working,
            broker_ticket: Some(1001),
            entry_price: 3600.0,
            stop_loss: 3592.0,
            take_profit: Some(3602.0),
            comment: "ab12cd34/1/3602".to_string(),
            expires_at: Utc::now(),
        };
        assert!(order.is_open());
        assert!(!order.is_terminal());

        order.state = OrderState::BreakEvenApplied;
        assert!(order.is_open());

        order.state = OrderState::Expired;
        assert!(order.is_terminal());
        assert!(!order.is_open());
    }
}
