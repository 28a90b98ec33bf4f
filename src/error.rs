use thiserror::Error;

/// Why a raw message could not be turned into a signal.
///
/// Parse failures are logged and the message is discarded; they never
/// trigger any order action.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("message does not look like a trading signal")]
    NotASignal,
    #[error("could not determine trade direction")]
    UnknownDirection,
    #[error("no entry price found in message")]
    MissingEntry,
    #[error("entry price {entry} outside plausible band {min}..{max}")]
    EntryOutOfRange { entry: f64, min: f64, max: f64 },
    #[error("no stop loss found in message")]
    MissingStopLoss,
    #[error("no take profit levels found in message")]
    MissingTargets,
    #[error("no recognized symbol in message")]
    UnknownSymbol,
}

/// Order placement failures reported by the execution platform.
#[derive(Debug, Clone, Error)]
pub enum PlacementError {
    /// Transport-level failure (timeout, connection reset, 5xx). Retried
    /// a bounded number of times with backoff.
    #[error("transport error: {0}")]
    Transport(String),
    /// Business-rule rejection (invalid price, market closed). Never
    /// retried; the order is marked failed.
    #[error("rejected by platform: {0}")]
    Rejected(String),
}

impl PlacementError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PlacementError::Transport(_))
    }
}

/// Failure to modify or cancel an existing order.
///
/// A missed break-even is safety-critical, so callers log these and retry
/// on the next poll cycle instead of treating them as fatal.
#[derive(Debug, Clone, Error)]
pub enum ModificationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by platform: {0}")]
    Rejected(String),
}

/// Price, position or server-time data could not be obtained this cycle.
/// The affected symbol is skipped; we never guess.
#[derive(Debug, Clone, Error)]
pub enum StaleDataError {
    #[error("no price available for {0}")]
    PriceUnavailable(String),
    #[error("server time unavailable: {0}")]
    ServerTimeUnavailable(String),
    #[error("position state unavailable for ticket {0}")]
    PositionUnavailable(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_error_transience() {
        assert!(PlacementError::Transport("timeout".into()).is_transient());
        assert!(!PlacementError::Rejected("invalid price".into()).is_transient());
    }
}
