//! Retry Policy Engine
//!
//! Pure classification of activity failures into retry-with-backoff or
//! terminal outcomes. The engine never sleeps and never mutates state, so
//! classifying the same failure twice always yields the same disposition;
//! jitter is applied by the caller at sleep time.
//!
//! The acquisition full→shallow fallback is part of this policy surface too:
//! the acquirer asks the engine whether a full-clone failure warrants the
//! one-shot shallow re-attempt instead of branching on exceptions inline.

use std::time::Duration;

use rand::Rng;

use crate::constants::retry as retry_constants;
use crate::types::{AcquisitionError, ProbeError, ReasoningError};

// =============================================================================
// Activities and Policies
// =============================================================================

/// Retryable unit of work within the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// One clone attempt.
    Acquisition,
    /// One reasoning call.
    Reasoning,
    /// The single persistence call.
    Persistence,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquisition => write!(f, "acquisition"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Persistence => write!(f, "persistence"),
        }
    }
}

/// Per-activity retry limits and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one.
    pub max_attempts: u32,
    /// Timeout for a single attempt.
    pub attempt_timeout: Duration,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_factor: f32,
}

impl RetryPolicy {
    pub fn reasoning() -> Self {
        Self {
            max_attempts: retry_constants::REASONING_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(
                crate::constants::reasoning::DEFAULT_TIMEOUT_SECS,
            ),
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }

    pub fn persistence() -> Self {
        Self {
            max_attempts: retry_constants::PERSISTENCE_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }

    /// Deterministic backoff delay for a given attempt number (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.powi(exponent as i32);
        let delay = Duration::from_secs_f32(self.base_delay.as_secs_f32() * factor);
        std::cmp::min(delay, self.max_delay)
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Re-attempt the same activity after this delay.
    Retry { delay: Duration },
    /// Stop; surface the failure to the caller.
    Terminal,
}

impl Disposition {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Failure classifier with per-activity policies.
///
/// Pure: holds only configuration, classification is a function of
/// `(activity, error, attempt)`.
#[derive(Debug, Clone)]
pub struct RetryPolicyEngine {
    reasoning: RetryPolicy,
    persistence: RetryPolicy,
}

impl Default for RetryPolicyEngine {
    fn default() -> Self {
        Self {
            reasoning: RetryPolicy::reasoning(),
            persistence: RetryPolicy::persistence(),
        }
    }
}

impl RetryPolicyEngine {
    pub fn new(reasoning: RetryPolicy, persistence: RetryPolicy) -> Self {
        Self {
            reasoning,
            persistence,
        }
    }

    pub fn policy(&self, kind: ActivityKind) -> &RetryPolicy {
        match kind {
            // Acquisition retries only through the shallow fallback, which has
            // its own single-shot rule; the generic policy never re-attempts.
            ActivityKind::Acquisition => &self.persistence,
            ActivityKind::Reasoning => &self.reasoning,
            ActivityKind::Persistence => &self.persistence,
        }
    }

    /// Whether a failed full clone should be re-attempted shallow.
    ///
    /// Immediate, no backoff, at most once; only memory/budget failures
    /// qualify. Connectivity and permission failures are terminal.
    pub fn shallow_fallback(&self, error: &AcquisitionError) -> bool {
        error.allows_shallow_fallback()
    }

    /// Classify a failure for the given activity and attempt number (1-based).
    ///
    /// Exceeding the activity's attempt cap converts any failure to Terminal
    /// regardless of class.
    pub fn classify(&self, kind: ActivityKind, error: &ProbeError, attempt: u32) -> Disposition {
        let policy = self.policy(kind);
        if attempt >= policy.max_attempts {
            return Disposition::Terminal;
        }

        match error {
            ProbeError::Reasoning(reasoning) => match reasoning {
                ReasoningError::RateLimited { retry_after } => Disposition::Retry {
                    delay: retry_after.unwrap_or_else(|| {
                        std::cmp::max(
                            policy.delay_for_attempt(attempt),
                            Duration::from_secs(retry_constants::RATE_LIMIT_DEFAULT_WAIT_SECS),
                        )
                    }),
                },
                ReasoningError::Timeout(_) | ReasoningError::Unavailable(_) => Disposition::Retry {
                    delay: policy.delay_for_attempt(attempt),
                },
                // One fixed-delay retry: a second malformed response means the
                // transport is not going to produce usable output.
                ReasoningError::MalformedOutput(_) if attempt == 1 => Disposition::Retry {
                    delay: Duration::from_millis(retry_constants::MALFORMED_RETRY_DELAY_MS),
                },
                ReasoningError::MalformedOutput(_)
                | ReasoningError::Unauthorized(_)
                | ReasoningError::BinaryMissing(_) => Disposition::Terminal,
            },

            // Attempt-level timeouts are a distinct failure class but retry
            // like transport timeouts.
            ProbeError::Timeout { .. } => Disposition::Retry {
                delay: policy.delay_for_attempt(attempt),
            },

            // Acquisition failures reaching the generic classifier are
            // terminal; the shallow fallback is decided separately.
            ProbeError::Acquisition(_) => Disposition::Terminal,

            // Persistence-layer hiccups are worth re-attempting.
            ProbeError::Database(_) | ProbeError::Io(_) | ProbeError::Storage(_)
                if kind == ActivityKind::Persistence =>
            {
                Disposition::Retry {
                    delay: policy.delay_for_attempt(attempt),
                }
            }

            _ => Disposition::Terminal,
        }
    }
}

// =============================================================================
// Backoff Helpers
// =============================================================================

/// Random jitter up to a quarter of the base delay.
///
/// Applied at sleep time only, so classification itself stays deterministic.
pub fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReasoningError;

    fn engine() -> RetryPolicyEngine {
        RetryPolicyEngine::default()
    }

    #[test]
    fn test_classify_is_idempotent() {
        let err = ProbeError::Reasoning(ReasoningError::Timeout(Duration::from_secs(5)));
        let first = engine().classify(ActivityKind::Reasoning, &err, 1);
        let second = engine().classify(ActivityKind::Reasoning, &err, 1);
        assert_eq!(first, second);
        assert!(first.is_retryable());
    }

    #[test]
    fn test_rate_limit_uses_server_hint() {
        let err = ProbeError::Reasoning(ReasoningError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        });
        match engine().classify(ActivityKind::Reasoning, &err, 1) {
            Disposition::Retry { delay } => assert_eq!(delay, Duration::from_secs(7)),
            Disposition::Terminal => panic!("rate limit must be retryable under the cap"),
        }
    }

    #[test]
    fn test_rate_limit_without_hint_waits_at_least_default() {
        let err = ProbeError::Reasoning(ReasoningError::RateLimited { retry_after: None });
        match engine().classify(ActivityKind::Reasoning, &err, 1) {
            Disposition::Retry { delay } => assert!(delay >= Duration::from_secs(30)),
            Disposition::Terminal => panic!("expected retry"),
        }
    }

    #[test]
    fn test_attempt_cap_converts_to_terminal() {
        let err = ProbeError::Reasoning(ReasoningError::Timeout(Duration::from_secs(5)));
        let cap = engine().policy(ActivityKind::Reasoning).max_attempts;
        assert_eq!(
            engine().classify(ActivityKind::Reasoning, &err, cap),
            Disposition::Terminal
        );
    }

    #[test]
    fn test_binary_missing_is_terminal() {
        let err = ProbeError::Reasoning(ReasoningError::BinaryMissing("no claude".into()));
        assert_eq!(
            engine().classify(ActivityKind::Reasoning, &err, 1),
            Disposition::Terminal
        );
    }

    #[test]
    fn test_malformed_output_retries_exactly_once() {
        let err = ProbeError::Reasoning(ReasoningError::MalformedOutput("not json".into()));
        match engine().classify(ActivityKind::Reasoning, &err, 1) {
            Disposition::Retry { delay } => assert_eq!(delay, Duration::from_millis(1_000)),
            Disposition::Terminal => panic!("first malformed output should retry"),
        }
        assert_eq!(
            engine().classify(ActivityKind::Reasoning, &err, 2),
            Disposition::Terminal
        );
    }

    #[test]
    fn test_shallow_fallback_is_memory_specific() {
        let e = engine();
        assert!(e.shallow_fallback(&AcquisitionError::OutOfMemory { target: "x".into() }));
        assert!(e.shallow_fallback(&AcquisitionError::BudgetExceeded {
            target: "x".into(),
            detail: "time".into()
        }));
        assert!(!e.shallow_fallback(&AcquisitionError::Unreachable {
            target: "x".into(),
            detail: "dns".into()
        }));
        assert!(!e.shallow_fallback(&AcquisitionError::Unauthorized { target: "x".into() }));
        assert!(!e.shallow_fallback(&AcquisitionError::NotFound { target: "x".into() }));
    }

    #[test]
    fn test_acquisition_errors_terminal_in_generic_path() {
        let err = ProbeError::Acquisition(AcquisitionError::OutOfMemory { target: "x".into() });
        assert_eq!(
            engine().classify(ActivityKind::Acquisition, &err, 1),
            Disposition::Terminal
        );
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::reasoning();
        let d1 = policy.delay_for_attempt(1);
        let d2 = policy.delay_for_attempt(2);
        let d3 = policy.delay_for_attempt(3);
        assert!(d1 < d2 && d2 < d3);
        assert!(policy.delay_for_attempt(100) <= policy.max_delay);
    }

    #[test]
    fn test_random_jitter_bounded() {
        let base = Duration::from_millis(1000);
        for _ in 0..32 {
            assert!(random_jitter(base) <= Duration::from_millis(250));
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn classification_is_deterministic(attempt in 1u32..16, secs in 0u64..3600) {
                let err = ProbeError::Reasoning(ReasoningError::Timeout(Duration::from_secs(secs)));
                let e = RetryPolicyEngine::default();
                prop_assert_eq!(
                    e.classify(ActivityKind::Reasoning, &err, attempt),
                    e.classify(ActivityKind::Reasoning, &err, attempt)
                );
            }

            #[test]
            fn delay_never_exceeds_cap(attempt in 1u32..10_000) {
                let policy = RetryPolicy::reasoning();
                prop_assert!(policy.delay_for_attempt(attempt) <= policy.max_delay);
            }

            #[test]
            fn cap_terminates_every_error_class(attempt in 0u32..64) {
                let e = RetryPolicyEngine::default();
                let errors = [
                    ProbeError::Reasoning(ReasoningError::RateLimited { retry_after: None }),
                    ProbeError::Reasoning(ReasoningError::Unavailable("x".into())),
                    ProbeError::Reasoning(ReasoningError::Timeout(Duration::from_secs(1))),
                ];
                for err in &errors {
                    if attempt >= e.policy(ActivityKind::Reasoning).max_attempts {
                        prop_assert_eq!(
                            e.classify(ActivityKind::Reasoning, err, attempt),
                            Disposition::Terminal
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_persistence_io_retryable() {
        let err = ProbeError::Storage("disk hiccup".into());
        assert!(
            engine()
                .classify(ActivityKind::Persistence, &err, 1)
                .is_retryable()
        );
        // The same failure during reasoning is not a persistence hiccup.
        assert_eq!(
            engine().classify(ActivityKind::Reasoning, &err, 1),
            Disposition::Terminal
        );
    }
}
