//! Per-request retry state machine.
//!
//! A request moves through `Attempting -> (Backoff -> Attempting)* ->
//! Succeeded | Exhausted`. Transitions are pure functions of the attempt
//! outcome and the [`RetryPolicy`], and all waiting goes through a
//! [`Sleeper`], so timing can be tested without real delays.

use std::future::Future;
use std::time::Duration;

use crate::config::{
    RATE_LIMIT_DEFAULT_WAIT_SECS, RATE_LIMIT_MAX_WAIT_SECS, RETRY_FACTOR, RETRY_INITIAL_DELAY_MS,
    RETRY_MAX_DELAY_SECS, RETRY_MAX_RETRIES,
};
use crate::error_handling::{FailureType, ScanError};
use crate::prefix::Prefix;

/// Waits for a duration. Injected so tests can record delays instead.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Timing and retry limits for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    /// Wait after a 429 without a usable `Retry-After`.
    pub rate_limit_wait: Duration,
    /// Ceiling for a provider-supplied `Retry-After`.
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: RETRY_MAX_RETRIES,
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            factor: RETRY_FACTOR,
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
            rate_limit_wait: Duration::from_secs(RATE_LIMIT_DEFAULT_WAIT_SECS),
            max_rate_limit_wait: Duration::from_secs(RATE_LIMIT_MAX_WAIT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): `initial * factor^(retry-1)`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Wait before retry number `retry` after `outcome`.
    ///
    /// A 429 waits what the provider asked for (bounded by
    /// `max_rate_limit_wait`) or `rate_limit_wait`. Gateway errors retry at
    /// once. Anything else backs off exponentially.
    fn delay_for(&self, outcome: &AttemptOutcome, retry: u32) -> Duration {
        match outcome {
            AttemptOutcome::RateLimited {
                retry_after: Some(wait),
            } => (*wait).min(self.max_rate_limit_wait),
            AttemptOutcome::RateLimited { retry_after: None } => self.rate_limit_wait,
            AttemptOutcome::Gateway(_) => Duration::ZERO,
            _ => self.backoff_delay(retry),
        }
    }
}

/// Result of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(Vec<Prefix>),
    /// HTTP 429, with the provider's suggested wait if any.
    RateLimited { retry_after: Option<Duration> },
    /// HTTP 502/503/504.
    Gateway(u16),
    /// Connection, timeout or body transfer failure.
    Transport(String),
    /// Unexpected status or unusable body; not worth retrying.
    GiveUp { reason: FailureType, detail: String },
}

impl AttemptOutcome {
    /// Failure category of a non-success outcome.
    pub fn failure_type(&self) -> Option<FailureType> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::RateLimited { .. } => Some(FailureType::AsnRateLimited),
            AttemptOutcome::Gateway(_) => Some(FailureType::AsnGatewayError),
            AttemptOutcome::Transport(_) => Some(FailureType::AsnTransportError),
            AttemptOutcome::GiveUp { reason, .. } => Some(*reason),
        }
    }

    /// The error a failed attempt represents.
    pub fn to_error(&self) -> Option<ScanError> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::RateLimited { retry_after } => Some(ScanError::RateLimited {
                retry_after: *retry_after,
            }),
            AttemptOutcome::Gateway(status) => {
                Some(ScanError::NetworkFailure(format!("gateway error HTTP {}", status)))
            }
            AttemptOutcome::Transport(detail) | AttemptOutcome::GiveUp { detail, .. } => {
                Some(ScanError::NetworkFailure(detail.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// About to make attempt number `attempt` (0 = initial). `polite` requests
    /// the spacing delay first.
    Attempting { attempt: u32, polite: bool },
    /// Waiting `delay` before attempt `next_attempt`.
    Backoff {
        next_attempt: u32,
        delay: Duration,
        polite: bool,
    },
    Succeeded {
        prefixes: Vec<Prefix>,
        attempts: u32,
    },
    Exhausted {
        reason: FailureType,
        attempts: u32,
    },
}

impl RetryState {
    pub fn initial() -> Self {
        RetryState::Attempting {
            attempt: 0,
            polite: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. }
        )
    }

    /// State after attempt number `attempt` produced `outcome`.
    pub fn after_attempt(attempt: u32, outcome: AttemptOutcome, policy: &RetryPolicy) -> Self {
        let attempts = attempt + 1;
        match outcome {
            AttemptOutcome::Success(prefixes) => RetryState::Succeeded { prefixes, attempts },
            AttemptOutcome::GiveUp { reason, .. } => RetryState::Exhausted { reason, attempts },
            retryable if attempt >= policy.max_retries => {
                log::debug!("Retries exhausted after {:?}", retryable);
                RetryState::Exhausted {
                    reason: FailureType::AsnRetriesExhausted,
                    attempts,
                }
            }
            retryable => {
                let next_attempt = attempt + 1;
                RetryState::Backoff {
                    next_attempt,
                    delay: policy.delay_for(&retryable, next_attempt),
                    polite: !matches!(retryable, AttemptOutcome::Gateway(_)),
                }
            }
        }
    }
}

/// Drives one request to a terminal state.
///
/// `attempt_fn` receives the attempt number and performs the request.
/// `spacing` is slept before every polite attempt. Gateway retries skip
/// both the spacing and the backoff.
pub async fn run_with_retry<S, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &S,
    spacing: Duration,
    mut attempt_fn: F,
) -> RetryState
where
    S: Sleeper,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome>,
{
    let mut state = RetryState::initial();
    loop {
        state = match state {
            RetryState::Attempting { attempt, polite } => {
                if polite && !spacing.is_zero() {
                    sleeper.sleep(spacing).await;
                }
                let outcome = attempt_fn(attempt).await;
                RetryState::after_attempt(attempt, outcome, policy)
            }
            RetryState::Backoff {
                next_attempt,
                delay,
                polite,
            } => {
                if !delay.is_zero() {
                    sleeper.sleep(delay).await;
                }
                RetryState::Attempting {
                    attempt: next_attempt,
                    polite,
                }
            }
            terminal => return terminal,
        };
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;
    use std::collections::VecDeque;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            factor: 2,
            max_delay: Duration::from_millis(350),
            rate_limit_wait: Duration::from_millis(50),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }

    fn prefixes() -> Vec<Prefix> {
        vec!["10.0.0.0/24".parse().expect("prefix")]
    }

    async fn drive(outcomes: Vec<AttemptOutcome>, spacing: Duration) -> (RetryState, Vec<Duration>, u32) {
        let sleeper = RecordingSleeper::default();
        let mut queue: VecDeque<_> = outcomes.into();
        let mut calls = 0;
        let state = run_with_retry(&policy(), &sleeper, spacing, |_| {
            calls += 1;
            let next = queue
                .pop_front()
                .unwrap_or(AttemptOutcome::Transport("exhausted script".into()));
            async move { next }
        })
        .await;
        (state, sleeper.recorded(), calls)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(p.backoff_delay(40), Duration::from_millis(350));
    }

    #[test]
    fn test_default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 3);
        assert!(p.max_rate_limit_wait > p.max_delay);
        assert_eq!(p.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(p.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(p.backoff_delay(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let (state, delays, calls) = drive(vec![AttemptOutcome::Success(prefixes())], Duration::ZERO).await;
        assert_eq!(
            state,
            RetryState::Succeeded {
                prefixes: prefixes(),
                attempts: 1
            }
        );
        assert!(delays.is_empty());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let (state, delays, calls) = drive(
            vec![
                AttemptOutcome::RateLimited { retry_after: None },
                AttemptOutcome::RateLimited {
                    retry_after: Some(Duration::from_millis(120)),
                },
                AttemptOutcome::Success(prefixes()),
            ],
            Duration::ZERO,
        )
        .await;
        assert!(matches!(state, RetryState::Succeeded { attempts: 3, .. }));
        assert_eq!(calls, 3);
        assert_eq!(
            delays,
            vec![Duration::from_millis(50), Duration::from_millis(120)]
        );
    }

    #[tokio::test]
    async fn test_transport_failures_exhaust_after_max_retries() {
        let (state, delays, calls) = drive(
            vec![AttemptOutcome::Transport("reset".into()); 10],
            Duration::ZERO,
        )
        .await;
        assert_eq!(
            state,
            RetryState::Exhausted {
                reason: FailureType::AsnRetriesExhausted,
                attempts: 4
            }
        );
        assert_eq!(calls, 4);
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(350)
            ]
        );
    }

    #[tokio::test]
    async fn test_give_up_stops_immediately() {
        let (state, delays, calls) = drive(
            vec![AttemptOutcome::GiveUp {
                reason: FailureType::AsnUnexpectedStatus,
                detail: "404".into(),
            }],
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(
            state,
            RetryState::Exhausted {
                reason: FailureType::AsnUnexpectedStatus,
                attempts: 1
            }
        );
        assert_eq!(calls, 1);
        assert_eq!(delays, vec![Duration::from_millis(10)]);
    }

    #[tokio::test]
    async fn test_gateway_retry_is_immediate() {
        let spacing = Duration::from_millis(10);
        let (state, delays, calls) = drive(
            vec![
                AttemptOutcome::Gateway(503),
                AttemptOutcome::Gateway(502),
                AttemptOutcome::Success(prefixes()),
            ],
            spacing,
        )
        .await;
        assert!(matches!(state, RetryState::Succeeded { attempts: 3, .. }));
        assert_eq!(calls, 3);
        // only the spacing before the first attempt
        assert_eq!(delays, vec![spacing]);
    }

    #[test]
    fn test_retry_after_is_honoured_beyond_backoff_cap() {
        let p = policy();
        let state = RetryState::after_attempt(
            0,
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(45)),
            },
            &p,
        );
        assert_eq!(
            state,
            RetryState::Backoff {
                next_attempt: 1,
                delay: Duration::from_secs(45),
                polite: true
            }
        );

        let state = RetryState::after_attempt(
            0,
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(3600)),
            },
            &p,
        );
        assert!(matches!(
            state,
            RetryState::Backoff { delay, .. } if delay == Duration::from_secs(60)
        ));
    }

    #[tokio::test]
    async fn test_transport_retry_keeps_spacing() {
        let spacing = Duration::from_millis(10);
        let (_, delays, _) = drive(
            vec![
                AttemptOutcome::Transport("timeout".into()),
                AttemptOutcome::Success(prefixes()),
            ],
            spacing,
        )
        .await;
        assert_eq!(delays, vec![spacing, Duration::from_millis(100), spacing]);
    }

    #[test]
    fn test_outcome_errors() {
        assert!(AttemptOutcome::Success(vec![]).to_error().is_none());
        assert!(matches!(
            AttemptOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
            .to_error(),
            Some(ScanError::RateLimited {
                retry_after: Some(d)
            }) if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            AttemptOutcome::Gateway(504).to_error(),
            Some(ScanError::NetworkFailure(msg)) if msg.contains("504")
        ));
    }

    #[test]
    fn test_outcome_failure_types() {
        assert_eq!(AttemptOutcome::Success(vec![]).failure_type(), None);
        assert_eq!(
            AttemptOutcome::Gateway(502).failure_type(),
            Some(FailureType::AsnGatewayError)
        );
        assert_eq!(
            AttemptOutcome::RateLimited { retry_after: None }.failure_type(),
            Some(FailureType::AsnRateLimited)
        );
    }
}
