use std::time::Duration;

use drive_open_config::DeepLinkSettings;

/// Fixed-interval poll with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedWait {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

impl<T> WaitOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            WaitOutcome::Ready(value) => Some(value),
            WaitOutcome::TimedOut { .. } => None,
        }
    }
}

impl BoundedWait {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_settings(settings: &DeepLinkSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.token_poll_interval_ms),
            settings.token_poll_attempts,
        )
    }

    /// Checks up to `max_attempts` times, sleeping `interval` between attempts.
    pub async fn until<T, F>(&self, mut check: F) -> WaitOutcome<T>
    where
        F: FnMut() -> Option<T>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = check() {
                return WaitOutcome::Ready(value);
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        WaitOutcome::TimedOut {
            attempts: self.max_attempts,
        }
    }
}
