use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket pacing outbound requests to `capacity` per minute.
///
/// Starts full, so the first `capacity` acquisitions go through immediately.
pub struct TokenBucketLimiter {
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Time it takes to earn a single token.
    pub fn token_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.capacity)
    }

    /// Waits until a token is available and consumes it.
    ///
    /// The state lock is held while waiting, so waiters are served in arrival
    /// order. Dropping the returned future abandons the wait without consuming.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.capacity / 60.0).min(self.capacity);
        state.last_refill = now;

        // A fractional balance still admits the caller; the deficit carries over
        if state.tokens <= 0.0 {
            let wait = self.token_interval();
            debug!("Rate limit reached, waiting {:?} for next token", wait);
            tokio::time::sleep(wait).await;
            // The wait itself paid for one token
            state.tokens += 1.0;
            state.last_refill = Instant::now();
        }

        state.tokens -= 1.0;
    }

    pub async fn available_tokens(&self) -> f64 {
        self.state.lock().await.tokens
    }
}
