//! Cluster formation barrier
//!
//! Replication only makes sense once the expected peers are present. The
//! barrier samples a [`MembershipView`] until it reports at least the expected
//! number of members or the deadline passes.
//!
//! The wait is a bounded retry loop: each sleep is clamped to the time left
//! before the deadline, the interval can grow by a backoff factor, and the view
//! is sampled one last time at the deadline. Timing out is an ordinary outcome,
//! not an error; the caller decides whether it is fatal.

use crate::membership::MembershipView;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Barrier state. `Formed` and `TimedOut` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarrierState {
    WaitingForPeers,
    Formed,
    TimedOut,
}

impl BarrierState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BarrierState::WaitingForPeers)
    }

    /// Next state after observing `observed` members.
    ///
    /// Formation wins over the deadline, so a view that reaches the expected
    /// size on the final sample still counts.
    pub fn observe(observed: usize, expected: usize, deadline_passed: bool) -> BarrierState {
        if observed >= expected {
            BarrierState::Formed
        } else if deadline_passed {
            BarrierState::TimedOut
        } else {
            BarrierState::WaitingForPeers
        }
    }
}

/// Configuration for the barrier.
#[derive(Clone, Debug)]
pub struct BarrierConfig {
    /// Number of members required, the local node included.
    pub expected_size: usize,
    /// Delay before the second sample.
    pub poll_interval: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
    /// Multiplier applied to the interval after each unsuccessful poll.
    /// `1.0` keeps a fixed interval.
    pub backoff_factor: f64,
    /// Upper bound for the interval when backing off.
    pub max_poll_interval: Duration,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            expected_size: 2,
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
            backoff_factor: 1.0,
            max_poll_interval: Duration::from_secs(5),
        }
    }
}

/// A barrier configuration that cannot be waited on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarrierConfigError {
    #[error("expected cluster size must be at least 1")]
    ZeroExpectedSize,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("backoff factor must be a finite number >= 1.0, got {0}")]
    InvalidBackoff(f64),
}

impl BarrierConfig {
    pub fn validate(&self) -> Result<(), BarrierConfigError> {
        if self.expected_size == 0 {
            return Err(BarrierConfigError::ZeroExpectedSize);
        }
        if self.poll_interval.is_zero() {
            return Err(BarrierConfigError::ZeroPollInterval);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(BarrierConfigError::InvalidBackoff(self.backoff_factor));
        }
        Ok(())
    }

    /// Interval after one more unsuccessful poll. Factors that are not a
    /// finite number above 1.0 keep the interval fixed.
    fn next_interval(&self, current: Duration) -> Duration {
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 1.0) {
            return current;
        }
        let cap = self.max_poll_interval.max(self.poll_interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .map_or(cap, |next| next.min(cap))
    }
}

/// Builder for barrier configuration.
pub struct BarrierConfigBuilder {
    config: BarrierConfig,
}

impl BarrierConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BarrierConfig::default(),
        }
    }

    pub fn expected_size(mut self, size: usize) -> Self {
        self.config.expected_size = size;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.config.backoff_factor = factor;
        self.config.max_poll_interval = max_interval;
        self
    }

    pub fn build(self) -> BarrierConfig {
        self.config
    }
}

impl Default for BarrierConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a finished wait.
#[derive(Clone, Debug, PartialEq)]
pub struct BarrierOutcome {
    /// Terminal state reached
    pub state: BarrierState,
    /// Member count seen on the last sample
    pub observed_size: usize,
    /// Number of samples taken
    pub polls: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

impl BarrierOutcome {
    pub fn is_formed(&self) -> bool {
        self.state == BarrierState::Formed
    }
}

/// Waits for a cluster to reach its expected size.
#[derive(Clone, Debug)]
pub struct ClusterBarrier {
    config: BarrierConfig,
}

impl ClusterBarrier {
    pub fn new(config: BarrierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    /// Sample `view` until the cluster forms or the deadline passes.
    ///
    /// Suspends the calling task for at most the configured timeout.
    pub async fn wait<V: MembershipView + ?Sized>(&self, view: &V) -> BarrierOutcome {
        let expected = self.config.expected_size;
        let node = view.local_node();
        let start = Instant::now();
        // A timeout too large to represent never expires.
        let deadline = start.checked_add(self.config.timeout);
        let mut interval = self.config.poll_interval;
        let mut polls = 0u32;

        info!(
            node = %node,
            expected,
            timeout = ?self.config.timeout,
            "waiting for cluster to form"
        );

        loop {
            let observed = view.current_size();
            polls += 1;
            let now = Instant::now();

            let deadline_passed = deadline.is_some_and(|deadline| now >= deadline);

            match BarrierState::observe(observed, expected, deadline_passed) {
                BarrierState::WaitingForPeers => {
                    debug!(node = %node, observed, expected, polls, "cluster not formed yet");
                    let sleep = match deadline {
                        Some(deadline) => interval.min(deadline.saturating_duration_since(now)),
                        None => interval,
                    };
                    tokio::time::sleep(sleep).await;
                    interval = self.config.next_interval(interval);
                }
                state => {
                    let outcome = BarrierOutcome {
                        state,
                        observed_size: observed,
                        polls,
                        elapsed: now - start,
                    };
                    if outcome.is_formed() {
                        info!(node = %node, members = observed, polls, "cluster formed");
                    } else {
                        warn!(
                            node = %node,
                            observed,
                            expected,
                            polls,
                            "cluster did not form before the deadline"
                        );
                    }
                    return outcome;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::NodeId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports a fixed sequence of sizes, repeating the last one.
    struct ScriptedView {
        node: NodeId,
        sizes: Vec<usize>,
        polls: AtomicUsize,
    }

    impl ScriptedView {
        fn new(sizes: Vec<usize>) -> Self {
            Self {
                node: NodeId::new("node-1"),
                sizes,
                polls: AtomicUsize::new(0),
            }
        }
    }

    impl MembershipView for ScriptedView {
        fn current_size(&self) -> usize {
            let i = self.polls.fetch_add(1, Ordering::SeqCst);
            self.sizes[i.min(self.sizes.len() - 1)]
        }

        fn local_node(&self) -> &NodeId {
            &self.node
        }
    }

    fn config(expected: usize) -> BarrierConfig {
        BarrierConfigBuilder::new()
            .expected_size(expected)
            .poll_interval(Duration::from_millis(100))
            .timeout(Duration::from_secs(1))
            .build()
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(BarrierState::observe(1, 2, false), BarrierState::WaitingForPeers);
        assert_eq!(BarrierState::observe(2, 2, false), BarrierState::Formed);
        assert_eq!(BarrierState::observe(3, 2, true), BarrierState::Formed);
        assert_eq!(BarrierState::observe(1, 2, true), BarrierState::TimedOut);

        assert!(!BarrierState::WaitingForPeers.is_terminal());
        assert!(BarrierState::Formed.is_terminal());
        assert!(BarrierState::TimedOut.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forms_on_third_poll() {
        let view = ScriptedView::new(vec![1, 1, 2]);
        let outcome = ClusterBarrier::new(config(2)).wait(&view).await;

        assert_eq!(outcome.state, BarrierState::Formed);
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.observed_size, 2);
        assert!(outcome.elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_alone() {
        let view = ScriptedView::new(vec![1]);
        let outcome = ClusterBarrier::new(config(2)).wait(&view).await;

        assert_eq!(outcome.state, BarrierState::TimedOut);
        assert_eq!(outcome.observed_size, 1);
        assert!(outcome.elapsed >= Duration::from_secs(1));
        // Samples at 0, 100, ..., 1000ms
        assert_eq!(outcome.polls, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_formed_needs_one_poll() {
        let view = ScriptedView::new(vec![3]);
        let outcome = ClusterBarrier::new(config(2)).wait(&view).await;

        assert!(outcome.is_formed());
        assert_eq!(outcome.polls, 1);
        assert!(outcome.elapsed < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_reduces_polls() {
        let config = BarrierConfigBuilder::new()
            .expected_size(2)
            .poll_interval(Duration::from_millis(100))
            .timeout(Duration::from_secs(1))
            .backoff(2.0, Duration::from_millis(400))
            .build();
        let view = ScriptedView::new(vec![1]);

        let outcome = ClusterBarrier::new(config).wait(&view).await;

        // Sleeps of 100, 200, 400, 300 (clamped to the deadline)
        assert_eq!(outcome.state, BarrierState::TimedOut);
        assert_eq!(outcome.polls, 5);
        assert!(outcome.elapsed >= Duration::from_secs(1));
    }

    #[test]
    fn test_next_interval_is_capped() {
        let config = BarrierConfigBuilder::new()
            .poll_interval(Duration::from_millis(100))
            .backoff(3.0, Duration::from_millis(250))
            .build();

        assert_eq!(
            config.next_interval(Duration::from_millis(100)),
            Duration::from_millis(250)
        );
        assert_eq!(
            BarrierConfig::default().next_interval(Duration::from_millis(100)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_unusable_backoff_factors_keep_the_interval() {
        for factor in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.5] {
            let config = BarrierConfigBuilder::new()
                .backoff(factor, Duration::from_secs(1))
                .build();
            assert_eq!(
                config.next_interval(Duration::from_millis(100)),
                Duration::from_millis(100)
            );
        }
    }

    #[test]
    fn test_huge_backoff_factor_is_capped() {
        let config = BarrierConfigBuilder::new()
            .poll_interval(Duration::from_millis(100))
            .backoff(1e300, Duration::from_secs(2))
            .build();

        assert_eq!(
            config.next_interval(Duration::from_secs(1)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_validate() {
        assert!(BarrierConfig::default().validate().is_ok());
        assert_eq!(
            config(0).validate(),
            Err(BarrierConfigError::ZeroExpectedSize)
        );
        assert_eq!(
            BarrierConfigBuilder::new()
                .poll_interval(Duration::ZERO)
                .build()
                .validate(),
            Err(BarrierConfigError::ZeroPollInterval)
        );
        assert!(matches!(
            BarrierConfigBuilder::new()
                .backoff(f64::NAN, Duration::from_secs(1))
                .build()
                .validate(),
            Err(BarrierConfigError::InvalidBackoff(_))
        ));
        assert_eq!(
            BarrierConfigBuilder::new()
                .backoff(0.5, Duration::from_secs(1))
                .build()
                .validate(),
            Err(BarrierConfigError::InvalidBackoff(0.5))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_nan_backoff_still_forms() {
        let config = BarrierConfigBuilder::new()
            .expected_size(2)
            .poll_interval(Duration::from_millis(100))
            .timeout(Duration::from_secs(1))
            .backoff(f64::NAN, Duration::from_secs(1))
            .build();
        let view = ScriptedView::new(vec![1, 1, 2]);

        let outcome = ClusterBarrier::new(config).wait(&view).await;

        assert!(outcome.is_formed());
        assert_eq!(outcome.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_does_not_overflow() {
        let config = BarrierConfigBuilder::new()
            .expected_size(2)
            .poll_interval(Duration::from_millis(100))
            .timeout(Duration::from_secs(u64::MAX))
            .build();
        let view = ScriptedView::new(vec![1, 1, 1, 2]);

        let outcome = ClusterBarrier::new(config).wait(&view).await;

        assert!(outcome.is_formed());
        assert_eq!(outcome.polls, 4);
    }
}
