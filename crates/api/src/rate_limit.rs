use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Per-client sliding window over request timestamps.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    /// Records a hit for `client`, or returns how long until the oldest hit expires.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let mut hits = self.hits.lock();
        if hits.len() > 4 * 1024 {
            hits.retain(|_, queue| {
                queue
                    .back()
                    .is_some_and(|last| now.duration_since(*last) <= self.window)
            });
        }

        let queue = hits.entry(client.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|first| now.duration_since(*first) > self.window)
        {
            queue.pop_front();
        }

        if let (true, Some(first)) = (queue.len() >= self.max_requests, queue.front()) {
            return Err(self.window.saturating_sub(now.duration_since(*first)));
        }

        queue.push_back(now);
        Ok(())
    }
}
