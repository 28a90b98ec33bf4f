//! Server clock offset tracking.
//!
//! Order expirations are evaluated against the platform's clock, not
//! ours, so we measure the offset once at startup and refresh it
//! periodically.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::broker::ExecutionPlatform;
use crate::error::StaleDataError;

#[derive(Debug)]
pub struct ServerClock {
    /// server time minus local time
    offset: RwLock<Duration>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self { offset: RwLock::new(Duration::zero()) }
    }

    /// Measure the offset against the platform. Called once per session
    /// at startup and refreshed periodically by the monitor.
    pub async fn sync(&self, platform: &dyn ExecutionPlatform) -> Result<(), StaleDataError> {
        let server_time = platform.get_server_time().await?;
        let offset = server_time - Utc::now();
        *self.offset.write().unwrap() = offset;
        tracing::info!("Server clock offset: {}s", offset.num_seconds());
        Ok(())
    }

    pub fn offset(&self) -> Duration {
        *self.offset.read().unwrap()
    }

    /// Current time on the platform's clock.
    pub fn now_server(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    /// Expiration timestamp `expiry_secs` from now, on the platform's
    /// clock.
    pub fn expiry_from_now(&self, expiry_secs: i64) -> DateTime<Utc> {
        self.now_server() + Duration::seconds(expiry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_offset_by_default() {
        let clock = ServerClock::new();
        assert_eq!(clock.offset(), Duration::zero());

        let before = Utc::now();
        let expiry = clock.expiry_from_now(720);
        let after = Utc::now();
        assert!(expiry >= before + Duration::seconds(720));
        assert!(expiry <= after + Duration::seconds(720));
    }

    #[test]
    fn test_expiry_follows_offset() {
        let clock = ServerClock::new();
        *clock.offset.write().unwrap() = Duration::seconds(3600);

        let expiry = clock.expiry_from_now(720);
        let local_based = Utc::now() + Duration::seconds(720);
        // expiry sits one hour ahead of a purely local computation
        let delta = expiry - local_based;
        assert!((delta - Duration::seconds(3600)).num_milliseconds().abs() < 500);
    }
}
