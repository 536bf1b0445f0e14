//! Request pacing, backoff and circuit breaking for one source.
//!
//! A [`RateController`] owns the [`RateState`] for a single job. Every request
//! goes through [`RateController::wait`], which sleeps until the current delay
//! (plus jitter) has passed since the previous response arrived and, when the
//! circuit is open, until the cooldown ends. Hostile responses grow the delay
//! exponentially; a success drops it back to the baseline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roster_core::CrawlConfig;
use roster_http::{ClientIdentity, IdentityPool};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Growth factor for rate-limit responses relative to other failures.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u64 = 3;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// How hostile a failed attempt was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSignal {
    /// Transport failure: timeout, reset, unreadable body
    Minimal,
    /// Server error status
    Standard,
    /// 429 or 403
    Severe,
}

impl BlockSignal {
    fn growth(self) -> u64 {
        match self {
            Self::Minimal => 1,
            Self::Standard => 2,
            Self::Severe => 2 * RATE_LIMIT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Pacing limits for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to every wait
    pub jitter: Duration,
    /// Failed attempts tolerated before the circuit opens
    pub max_retries: u32,
    pub circuit_cooldown: Duration,
}

impl RatePolicy {
    /// Delay after the `failures`-th consecutive failure:
    /// `base · growth · 2^(failures-1)`, capped at `max_delay`.
    ///
    /// With [`BlockSignal::Standard`] this is `base · 2^failures`.
    pub fn backoff_delay(&self, failures: u32, signal: BlockSignal) -> Duration {
        let base = millis(self.base_delay);
        let ceiling = millis(self.max_delay);
        let exponent = 2u64.saturating_pow(failures.saturating_sub(1));

        let delay = base
            .saturating_mul(signal.growth())
            .saturating_mul(exponent)
            .min(ceiling);
        Duration::from_millis(delay)
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for RatePolicy {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_retries: config.max_retries,
            circuit_cooldown: Duration::from_secs(config.circuit_cooldown_secs),
        }
    }
}

/// Mutable pacing state, changed only through [`RateController`].
#[derive(Debug, Clone)]
pub struct RateState {
    pub current_delay: Duration,
    pub consecutive_failures: u32,
    pub circuit_open_until: Option<Instant>,
    /// When the previous request was sent, or its answer arrived if later
    last_request: Option<Instant>,
}

pub struct RateController {
    policy: RatePolicy,
    state: RateState,
    identities: IdentityPool,
    rng: StdRng,
}

impl RateController {
    pub fn new(policy: RatePolicy, identities: IdentityPool) -> Self {
        let state = RateState {
            current_delay: policy.base_delay,
            consecutive_failures: 0,
            circuit_open_until: None,
            last_request: None,
        };
        Self {
            policy,
            state,
            identities,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn state(&self) -> &RateState {
        &self.state
    }

    pub fn current_delay(&self) -> Duration {
        self.state.current_delay
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.consecutive_failures
    }

    pub fn is_circuit_open(&self) -> bool {
        self.state.circuit_open_until.is_some()
    }

    fn jitter(&mut self) -> Duration {
        let max = millis(self.policy.jitter);
        if max == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.rng.gen_range(0..=max))
        }
    }

    /// Suspend until the next request may be sent, then hand out a fresh
    /// client identity.
    ///
    /// The first request of a job waits only the jitter. An open circuit is
    /// waited out and then closed; the elevated delay is kept so the first
    /// request after recovery is still cautious.
    pub async fn wait(&mut self) -> ClientIdentity {
        if let Some(until) = self.state.circuit_open_until.take() {
            if until > Instant::now() {
                warn!(
                    cooldown_ms = millis(until.saturating_duration_since(Instant::now())),
                    "circuit open, waiting for cooldown"
                );
                sleep_until(until).await;
            }
            self.state.consecutive_failures = 0;
            info!(
                delay_ms = millis(self.state.current_delay),
                "circuit closed"
            );
        }

        let jitter = self.jitter();
        let ready_at = match self.state.last_request {
            Some(last) => last + self.state.current_delay + jitter,
            None => Instant::now() + jitter,
        };
        if ready_at > Instant::now() {
            sleep_until(ready_at).await;
        }

        self.state.last_request = Some(Instant::now());
        let identity = self.identities.rotate(&mut self.rng);
        debug!(
            user_agent = %identity.user_agent,
            delay_ms = millis(self.state.current_delay),
            "request slot granted"
        );
        identity
    }

    /// Mark the end of an attempt, answered or not. The next delay counts
    /// from here, so a slow failure still gets its full backoff.
    pub fn record_response(&mut self) {
        self.state.last_request = Some(Instant::now());
    }

    pub fn on_success(&mut self) {
        self.state.current_delay = self.policy.base_delay;
        self.state.consecutive_failures = 0;
    }

    /// Record a failed attempt and grow the delay.
    ///
    /// Returns whether the caller may retry. Once failures exceed
    /// `max_retries` the circuit opens for the cooldown period and `false`
    /// is returned.
    pub fn on_blocked(&mut self, signal: BlockSignal) -> bool {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        let failures = self.state.consecutive_failures;

        let backoff = self.policy.backoff_delay(failures, signal);
        self.state.current_delay = self.state.current_delay.max(backoff);

        let may_retry = failures <= self.policy.max_retries;
        if may_retry {
            debug!(
                failures,
                ?signal,
                delay_ms = millis(self.state.current_delay),
                "backing off"
            );
        } else {
            self.state.circuit_open_until = Some(Instant::now() + self.policy.circuit_cooldown);
            warn!(
                failures,
                ?signal,
                cooldown_secs = self.policy.circuit_cooldown.as_secs(),
                "retry budget exhausted, circuit opened"
            );
        }
        may_retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RatePolicy {
        RatePolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            jitter: Duration::ZERO,
            max_retries: 2,
            circuit_cooldown: Duration::from_secs(60),
        }
    }

    fn controller() -> RateController {
        RateController::new(policy(), IdentityPool::new(vec![]))
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RatePolicy::from(&CrawlConfig::default());
        assert_eq!(policy.base_delay, Duration::from_millis(1500));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.circuit_cooldown, Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_formula() {
        let policy = policy();
        assert_eq!(
            policy.backoff_delay(1, BlockSignal::Standard),
            Duration::from_millis(2000)
        );
        assert_eq!(
            policy.backoff_delay(2, BlockSignal::Standard),
            Duration::from_millis(4000)
        );
        assert_eq!(
            policy.backoff_delay(1, BlockSignal::Minimal),
            Duration::from_millis(1000)
        );
        assert_eq!(
            policy.backoff_delay(1, BlockSignal::Severe),
            Duration::from_millis(6000)
        );
        assert_eq!(
            policy.backoff_delay(30, BlockSignal::Standard),
            Duration::from_millis(10_000)
        );
    }

    #[tokio::test]
    async fn test_backoff_monotonic_and_reset() {
        let mut rate = controller();
        let mut previous = rate.current_delay();

        for _ in 0..2 {
            assert!(rate.on_blocked(BlockSignal::Standard));
            assert!(rate.current_delay() >= previous);
            previous = rate.current_delay();
        }

        rate.on_success();
        assert_eq!(rate.current_delay(), Duration::from_millis(1000));
        assert_eq!(rate.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_weaker_signal_never_lowers_delay() {
        let mut rate = controller();
        rate.on_blocked(BlockSignal::Severe);
        let after_severe = rate.current_delay();
        rate.on_blocked(BlockSignal::Minimal);
        assert!(rate.current_delay() >= after_severe);
    }

    #[tokio::test]
    async fn test_retry_budget_opens_circuit() {
        let mut rate = controller();
        assert!(rate.on_blocked(BlockSignal::Minimal));
        assert!(rate.on_blocked(BlockSignal::Minimal));
        assert!(!rate.is_circuit_open());

        assert!(!rate.on_blocked(BlockSignal::Minimal));
        assert!(rate.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_spaces_requests() {
        let mut rate = controller();

        let start = Instant::now();
        rate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        rate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));

        rate.on_blocked(BlockSignal::Standard);
        let before = Instant::now();
        rate.wait().await;
        assert!(before.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_counts_from_response() {
        let mut rate = controller();
        rate.wait().await;

        tokio::time::sleep(Duration::from_secs(7)).await;
        rate.record_response();
        rate.on_blocked(BlockSignal::Severe);

        let answered = Instant::now();
        rate.wait().await;
        assert!(answered.elapsed() >= Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_honors_open_circuit() {
        let mut rate = controller();
        rate.wait().await;
        for _ in 0..3 {
            rate.on_blocked(BlockSignal::Standard);
        }
        assert!(rate.is_circuit_open());
        let elevated = rate.current_delay();

        let before = Instant::now();
        rate.wait().await;
        assert!(before.elapsed() >= Duration::from_secs(60));
        assert!(!rate.is_circuit_open());
        assert_eq!(rate.consecutive_failures(), 0);
        assert_eq!(rate.current_delay(), elevated);
    }
}
