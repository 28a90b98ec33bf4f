// Order decision engine: signal + current price -> order intent.
//
// Pure and shared across all targets of one signal: the outcome depends
// only on entry/stop/direction/price, never on the target value.

use serde::Deserialize;

use crate::models::{Direction, Signal};

/// How the market-order tolerance is derived.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum Tolerance {
    /// Flat tolerance in price units
    Fixed(f64),
    /// Tolerance as a fraction of the entry price
    PercentOfEntry(f64),
}

impl Tolerance {
    pub fn resolve(&self, entry_price: f64) -> f64 {
        match self {
            Tolerance::Fixed(units) => *units,
            Tolerance::PercentOfEntry(factor) => entry_price * factor,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Fixed(0.7)
    }
}

/// What to do with every target of a signal at the current price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDecision {
    /// Price is close enough to entry: execute immediately
    Market,
    /// Price ran away from entry: park a pending order at entry
    Limit(f64),
    /// Price already breached the stop: place nothing
    Cancel,
}

/// Decide the order kind for a signal at the current market price.
///
/// Boundary convention: exact equality favors Cancel over Market, and
/// Market over Limit.
pub fn decide(signal: &Signal, current_price: f64, tolerance: Tolerance) -> OrderDecision {
    let entry = signal.entry_price;
    let sl = signal.stop_loss;
    let t = tolerance.resolve(entry);

    match signal.direction {
        Direction::Buy => {
            if current_price <= sl {
                OrderDecision::Cancel
            } else if current_price < entry + t {
                OrderDecision::Market
            } else {
                OrderDecision::Limit(entry)
            }
        }
        Direction::Sell => {
            if current_price >= sl {
                OrderDecision::Cancel
            } else if current_price > entry - t {
                OrderDecision::Market
            } else {
                OrderDecision::Limit(entry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceFormat, Target, TargetPrice};
    use chrono::Utc;
    use uuid::Uuid;

    fn buy_signal() -> Signal {
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

    fn sell_signal() -> Signal {
        let mut signal = buy_signal();
        signal.direction = Direction::Sell;
        signal.stop_loss = 3608.0;
        signal
    }

    const T: Tolerance = Tolerance::Fixed(0.7);

    #[test]
    fn test_buy_inside_tolerance_is_market() {
        assert_eq!(decide(&buy_signal(), 3600.3, T), OrderDecision::Market);
        // anywhere above the stop and below entry + T
        assert_eq!(decide(&buy_signal(), 3593.0, T), OrderDecision::Market);
    }

    #[test]
    fn test_buy_above_tolerance_is_limit_at_entry() {
        assert_eq!(decide(&buy_signal(), 3605.0, T), OrderDecision::Limit(3600.0));
    }

    #[test]
    fn test_buy_below_stop_is_cancel() {
        assert_eq!(decide(&buy_signal(), 3591.0, T), OrderDecision::Cancel);
    }

    #[test]
    fn test_buy_boundaries_exact() {
        // exactly at the stop: Cancel wins over Market
        assert_eq!(decide(&buy_signal(), 3592.0, T), OrderDecision::Cancel);
        // exactly at entry + T: Limit wins over Market
        assert_eq!(decide(&buy_signal(), 3600.7, T), OrderDecision::Limit(3600.0));
        // one tick inside
        assert_eq!(decide(&buy_signal(), 3600.69, T), OrderDecision::Market);
    }

    #[test]
    fn test_sell_mirrors_buy() {
        let signal = sell_signal();
        assert_eq!(decide(&signal, 3599.7, T), OrderDecision::Market);
        assert_eq!(decide(&signal, 3595.0, T), OrderDecision::Limit(3600.0));
        assert_eq!(decide(&signal, 3608.0, T), OrderDecision::Cancel);
        assert_eq!(decide(&signal, 3610.0, T), OrderDecision::Cancel);
        // exactly at entry - T: Limit, not Market
        assert_eq!(decide(&signal, 3599.3, T), OrderDecision::Limit(3600.0));
    }

    #[test]
    fn test_percentage_tolerance() {
        // factor chosen so T = 3600 * 0.00019444 ≈ 0.699984
        let t = Tolerance::PercentOfEntry(0.00019444);
        assert!((t.resolve(3600.0) - 0.7).abs() < 1e-3);
        assert_eq!(decide(&buy_signal(), 3600.5, t), OrderDecision::Market);
        assert_eq!(decide(&buy_signal(), 3601.0, t), OrderDecision::Limit(3600.0));
    }

    #[test]
    fn test_default_tolerance_is_fixed_0_7() {
        assert_eq!(Tolerance::default(), Tolerance::Fixed(0.7));
    }
}
