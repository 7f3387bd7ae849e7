//! Window scheduler
//!
//! Fires once per window period. The first tick is one full period after
//! creation. A tick delayed by a slow join pushes later ticks back instead
//! of firing a burst to catch up.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub struct WindowScheduler {
    interval: Interval,
    period: Duration,
}

impl WindowScheduler {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Wait for the current window to close
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let start = Instant::now();
        let mut scheduler = WindowScheduler::new(Duration::from_millis(50));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(50));

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_tick_delays_schedule() {
        let start = Instant::now();
        let mut scheduler = WindowScheduler::new(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(35)).await;
        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(35));

        // Next tick is one period after the late one, not a catch-up burst
        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(45));
        assert_eq!(scheduler.period(), Duration::from_millis(10));
    }
}
