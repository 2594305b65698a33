use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ClockError;
use crate::keeper::ChainClock;

/// Waits for deadlines measured in chain time.
///
/// The wait sleeps in steps of at most `max_poll` and re-reads the chain
/// clock after each step. It only returns once the latest block timestamp
/// has reached the deadline. Dropping the future cancels it.
#[derive(Clone)]
pub struct DeadlineScheduler {
    clock: Arc<dyn ChainClock>,
    max_poll: Duration,
}

impl DeadlineScheduler {
    pub fn new(clock: Arc<dyn ChainClock>, max_poll: Duration) -> Self {
        Self {
            clock,
            max_poll: max_poll.max(Duration::from_secs(1)),
        }
    }

    /// Seconds of chain time left before `deadline`. Zero if already past.
    pub async fn remaining(&self, deadline: u64) -> Result<u64, ClockError> {
        let now = self.clock.now().await?;
        Ok(deadline.saturating_sub(now))
    }

    /// Suspend until chain time >= `deadline`. Returns the observed chain
    /// time. No sleep happens if the deadline has already passed.
    pub async fn wait_until(&self, deadline: u64) -> Result<u64, ClockError> {
        loop {
            let now = self.clock.now().await?;
            if now >= deadline {
                return Ok(now);
            }
            let step = Duration::from_secs(deadline - now).min(self.max_poll);
            debug!(deadline, now, step_secs = step.as_secs(), "waiting for deadline");
            tokio::time::sleep(step).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::Instant;

    /// Chain time that advances with tokio's (paused) clock.
    struct TokioClock {
        base: u64,
        started: Instant,
    }

    #[async_trait]
    impl ChainClock for TokioClock {
        async fn now(&self) -> Result<u64, ClockError> {
            Ok(self.base + self.started.elapsed().as_secs())
        }
    }

    /// Chain time that lags: only moves when blocks are "mined" by the test.
    struct StepClock {
        now: AtomicU64,
        reads: AtomicU64,
    }

    #[async_trait]
    impl ChainClock for StepClock {
        async fn now(&self) -> Result<u64, ClockError> {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            // Chain time stalls for the first two reads, then jumps.
            if reads >= 2 {
                self.now.store(2000, Ordering::SeqCst);
            }
            Ok(self.now.load(Ordering::SeqCst))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_deadline() {
        let clock = Arc::new(TokioClock { base: 1000, started: Instant::now() });
        let scheduler = DeadlineScheduler::new(clock, Duration::from_secs(60));

        assert_eq!(scheduler.remaining(1010).await.unwrap(), 10);

        let start = Instant::now();
        let observed = scheduler.wait_until(1010).await.unwrap();
        assert!(observed >= 1010);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_returns_immediately() {
        let clock = Arc::new(TokioClock { base: 1000, started: Instant::now() });
        let scheduler = DeadlineScheduler::new(clock, Duration::from_secs(60));

        assert_eq!(scheduler.remaining(900).await.unwrap(), 0);

        let start = Instant::now();
        assert_eq!(scheduler.wait_until(1000).await.unwrap(), 1000);
        assert_eq!(scheduler.wait_until(900).await.unwrap(), 1000);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rechecks_chain_time_when_blocks_lag() {
        let clock = Arc::new(StepClock {
            now: AtomicU64::new(1000),
            reads: AtomicU64::new(0),
        });
        let scheduler = DeadlineScheduler::new(clock.clone(), Duration::from_secs(5));

        // Wall time alone would finish after 10s; chain time keeps it waiting
        // until a block past the deadline is seen.
        let observed = scheduler.wait_until(1010).await.unwrap();
        assert_eq!(observed, 2000);
        assert_eq!(clock.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_wait_is_split_into_polls() {
        let clock = Arc::new(TokioClock { base: 0, started: Instant::now() });
        let scheduler = DeadlineScheduler::new(clock, Duration::from_secs(60));

        let start = Instant::now();
        scheduler.wait_until(3600).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3600));
    }
}
