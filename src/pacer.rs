use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::browser::BrowserSession;
use crate::config::Timing;

/// Human-like scrolling and delays.
#[derive(Debug, Clone)]
pub struct Pacer {
    delta: RangeInclusive<i64>,
    pause_ms: RangeInclusive<u64>,
}

impl Pacer {
    pub fn new(timing: &Timing) -> Self {
        Self {
            delta: timing.scroll_delta.clone(),
            pause_ms: timing.scroll_pause_ms.clone(),
        }
    }

    /// Scroll in random steps for roughly `duration`. A failed scroll means
    /// there is nothing more to scroll, so the burst just ends.
    pub async fn scroll<S>(&self, session: &S, duration: Duration)
    where
        S: BrowserSession + ?Sized,
    {
        let start = Instant::now();
        let mut steps = 0usize;
        while start.elapsed() < duration {
            let delta = rand::thread_rng().gen_range(self.delta.clone());
            if let Err(e) = session.scroll_by(delta).await {
                debug!("Scroll stopped after {} steps: {}", steps, e);
                return;
            }
            steps += 1;
            tokio::time::sleep(jitter(&self.pause_ms)).await;
        }
        debug!("Scrolled {} steps in {:.1}s", steps, start.elapsed().as_secs_f64());
    }

    /// Sleep for a uniformly drawn number of milliseconds.
    pub async fn pause(&self, range: &RangeInclusive<u64>) {
        tokio::time::sleep(jitter(range)).await;
    }
}

pub fn jitter(range: &RangeInclusive<u64>) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(range.clone()))
}
