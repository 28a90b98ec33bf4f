// Break-even and expiration monitoring
//
// One polling loop owns all time-driven supervision: promoting filled
// limit orders, expiring stale pending orders, applying break-even once
// a group's first target trades, and keeping the server clock offset
// fresh.

use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::broker::{ExecutionPlatform, ServerClock};
use crate::models::Direction;
use crate::orchestrator::{BreakEvenCandidate, Orchestrator};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Resync the server clock every this many cycles
    pub clock_resync_cycles: u32,
    /// Which target triggers break-even (1-based)
    pub break_even_target_index: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            clock_resync_cycles: 60,
            break_even_target_index: 1,
        }
    }
}

pub struct BreakEvenMonitor {
    orchestrator: Arc<Orchestrator>,
    platform: Arc<dyn ExecutionPlatform>,
    clock: Arc<ServerClock>,
    config: MonitorConfig,
}

impl BreakEvenMonitor {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        platform: Arc<dyn ExecutionPlatform>,
        clock: Arc<ServerClock>,
        config: MonitorConfig,
    ) -> Self {
        Self { orchestrator, platform, clock, config }
    }

    /// Run forever. Slow cycles skip ticks instead of piling up.
    pub async fn run(self) {
        tracing::info!(
            "Break-even monitor starting (interval {:?})",
            self.config.poll_interval
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tick_count = 0u32;
        loop {
            ticker.tick().await;
            tick_count += 1;

            self.cycle().await;

            if tick_count % self.config.clock_resync_cycles == 0 {
                if let Err(e) = self.clock.sync(self.platform.as_ref()).await {
                    tracing::warn!("Server clock resync failed: {}", e);
                }
            }
        }
    }

    /// One supervision pass. Public so tests can drive cycles directly.
    pub async fn cycle(&self) {
        self.orchestrator.sync_states().await;
        self.orchestrator.expire_orders().await;

        let candidates = self
            .orchestrator
            .break_even_candidates(self.config.break_even_target_index)
            .await;

        for candidate in candidates {
            match self
                .platform
                .get_price(&candidate.symbol, candidate.direction)
                .await
            {
                Ok(price) if crossed(&candidate, price) => {
                    tracing::info!(
                        "Signal {}: TP1 reached ({:.2} vs trigger {:.2}), applying break-even",
                        candidate.signal_id,
                        price,
                        candidate.trigger
                    );
                    self.orchestrator.apply_break_even(candidate.signal_id).await;
                }
                Ok(_) => {}
                Err(e) => {
                    // stale price: skip this group for the cycle, never guess
                    tracing::debug!(
                        "Skipping break-even check for {}: {}",
                        candidate.symbol,
                        e
                    );
                }
            }
        }
    }
}

/// Has price crossed the trigger in the direction of profit?
fn crossed(candidate: &BreakEvenCandidate, price: f64) -> bool {
    match candidate.direction {
        Direction::Buy => price >= candidate.trigger,
        Direction::Sell => price <= candidate.trigger,
    }
}
