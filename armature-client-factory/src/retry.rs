//! Retry strategies and retry policy resolution.
//!
//! Retry settings may come from the endpoint block or the global block, each
//! holding either a custom retryer or structured parameters (never both).
//! Endpoint settings win over global ones; with nothing configured the
//! transport default applies.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{EndpointConfig, GlobalConfig, RetryParams, TypeRef};
use crate::error::{ComponentKind, ConfigurationError, FactoryError, FactoryResult, RetryScope};
use crate::instantiate::Instantiator;
use crate::HttpClientError;

/// Multiplier applied to the wait after every retry.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Retry strategy trait for custom retry logic.
pub trait RetryStrategy: Send + Sync {
    /// Check if the request should be retried after `attempt` attempts
    /// (the original call is attempt 1).
    fn should_retry(&self, attempt: u32, error: &HttpClientError) -> bool;

    /// Get the delay before the next attempt.
    fn retry_delay(&self, attempt: u32, error: &HttpClientError) -> Duration;
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Exponential backoff with a ceiling.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier.
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Exponential { initial, max, multiplier } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let millis = initial.as_millis() as f64 * factor;
                if millis >= max.as_millis() as f64 {
                    *max
                } else {
                    Duration::from_millis(millis as u64)
                }
            }
        }
    }

    /// Upper bound of any delay this strategy produces.
    pub fn ceiling(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Exponential { max, .. } => *max,
        }
    }
}

/// Attempt-bounded retry policy.
///
/// Only failures that are retryable (connection errors, timeouts, and
/// errors the error decoder marked retryable) are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the original call included.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Exponential policy: first retry after `period`, each following wait
    /// multiplied by 1.5 and capped at `max_period`.
    pub fn exponential(period: Duration, max_period: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential {
                initial: period,
                max: max_period,
                multiplier: BACKOFF_MULTIPLIER,
            },
        }
    }

    /// Policy that never retries.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
        }
    }

    /// Built-in transport policy: 100 ms, 1 s ceiling, 5 attempts.
    pub fn transport_default() -> Self {
        let params = RetryParams::default();
        Self::exponential(params.period(), params.max_period(), params.max_attempts)
    }

    /// Create a policy from structured parameters.
    pub fn from_params(params: &RetryParams) -> Self {
        if params.active {
            Self::exponential(params.period(), params.max_period(), params.max_attempts)
        } else {
            Self::never()
        }
    }
}

impl RetryStrategy for RetryPolicy {
    fn should_retry(&self, attempt: u32, error: &HttpClientError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    fn retry_delay(&self, attempt: u32, error: &HttpClientError) -> Duration {
        if let HttpClientError::Retryable {
            retry_after: Some(after),
            ..
        } = error
        {
            return (*after).min(self.backoff.ceiling());
        }
        self.backoff.delay_for_attempt(attempt.saturating_sub(1))
    }
}

/// Which retry behaviour applies to an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicyDecision {
    /// Nothing configured; the transport's built-in policy applies.
    TransportDefault,
    /// Retrying is switched off.
    Never {
        /// Scope the decision came from.
        scope: RetryScope,
    },
    /// Exponential backoff from structured parameters.
    Exponential {
        /// Scope the decision came from.
        scope: RetryScope,
        /// Wait before the first retry.
        period: Duration,
        /// Ceiling for any wait.
        max_period: Duration,
        /// Total attempts.
        max_attempts: u32,
    },
    /// User-supplied retry strategy.
    Custom {
        /// Scope the decision came from.
        scope: RetryScope,
        /// Registered strategy name.
        retryer: TypeRef,
    },
}

impl RetryPolicyDecision {
    /// Resolve the retry behaviour of `endpoint`.
    ///
    /// Both scopes are checked for conflicts before precedence is applied.
    pub fn resolve(endpoint: &EndpointConfig, global: &GlobalConfig) -> FactoryResult<Self> {
        check_exclusive(endpoint.retryer.as_ref(), endpoint.retry.as_ref(), RetryScope::Endpoint)?;
        check_exclusive(global.retryer.as_ref(), global.retry.as_ref(), RetryScope::Global)?;

        if let Some(decision) =
            Self::from_scope(endpoint.retryer.as_ref(), endpoint.retry.as_ref(), RetryScope::Endpoint)?
        {
            return Ok(decision);
        }

        if let Some(decision) =
            Self::from_scope(global.retryer.as_ref(), global.retry.as_ref(), RetryScope::Global)?
        {
            return Ok(decision);
        }

        Ok(Self::TransportDefault)
    }

    fn from_scope(
        retryer: Option<&TypeRef>,
        retry: Option<&RetryParams>,
        scope: RetryScope,
    ) -> FactoryResult<Option<Self>> {
        if let Some(retryer) = retryer {
            return Ok(Some(Self::Custom {
                scope,
                retryer: retryer.clone(),
            }));
        }

        let Some(params) = retry else {
            return Ok(None);
        };

        if !params.active {
            return Ok(Some(Self::Never { scope }));
        }

        if params.max_attempts == 0 {
            return Err(ConfigurationError::InvalidRetry {
                scope,
                reason: "maxAttempts must be at least 1".to_string(),
            }
            .into());
        }

        Ok(Some(Self::Exponential {
            scope,
            period: params.period(),
            max_period: params.max_period(),
            max_attempts: params.max_attempts,
        }))
    }

    /// Scope the decision came from; `None` for the transport default.
    pub fn scope(&self) -> Option<RetryScope> {
        match self {
            Self::TransportDefault => None,
            Self::Never { scope } | Self::Exponential { scope, .. } | Self::Custom { scope, .. } => {
                Some(*scope)
            }
        }
    }

    /// Produce the executable strategy.
    pub fn strategy(&self, instantiator: &dyn Instantiator) -> FactoryResult<Arc<dyn RetryStrategy>> {
        debug!(decision = ?self, "Resolved retry policy");

        match self {
            Self::TransportDefault => Ok(Arc::new(RetryPolicy::transport_default())),
            Self::Never { .. } => Ok(Arc::new(RetryPolicy::never())),
            Self::Exponential {
                period,
                max_period,
                max_attempts,
                ..
            } => Ok(Arc::new(RetryPolicy::exponential(*period, *max_period, *max_attempts))),
            Self::Custom { retryer, .. } => instantiator
                .retryer(retryer)
                .map_err(|e| FactoryError::instantiation(ComponentKind::Retryer, retryer, e)),
        }
    }
}

fn check_exclusive(
    retryer: Option<&TypeRef>,
    retry: Option<&RetryParams>,
    scope: RetryScope,
) -> FactoryResult<()> {
    if retryer.is_some() && retry.is_some() {
        return Err(ConfigurationError::ConflictingRetryConfig { scope }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retryable() -> HttpClientError {
        HttpClientError::Retryable {
            status: Some(500),
            message: "server error".into(),
            retry_after: None,
        }
    }

    fn endpoint(retryer: Option<&str>, retry: Option<RetryParams>) -> EndpointConfig {
        EndpointConfig {
            retryer: retryer.map(TypeRef::from),
            retry,
            ..EndpointConfig::with_base_url("http://svc")
        }
    }

    fn global(retryer: Option<&str>, retry: Option<RetryParams>) -> GlobalConfig {
        GlobalConfig {
            retryer: retryer.map(TypeRef::from),
            retry,
            ..GlobalConfig::default()
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 1.5,
        };

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(150));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(225));
        assert_eq!(strategy.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn test_constant_backoff() {
        let strategy = BackoffStrategy::Constant(Duration::from_millis(500));

        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[test]
    fn test_policy_counts_total_attempts() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1), 4);
        let err = retryable();

        assert!(policy.should_retry(1, &err));
        assert!(policy.should_retry(3, &err));
        assert!(!policy.should_retry(4, &err));
        assert_eq!(policy.retry_delay(1, &err), Duration::from_millis(100));
        assert_eq!(policy.retry_delay(2, &err), Duration::from_millis(150));
    }

    #[test]
    fn test_policy_skips_non_retryable() {
        let policy = RetryPolicy::transport_default();
        let err = HttpClientError::Response {
            status: 404,
            message: "not found".into(),
        };
        assert!(!policy.should_retry(1, &err));
        assert!(!RetryPolicy::never().should_retry(1, &retryable()));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1), 3);
        let err = HttpClientError::Retryable {
            status: Some(429),
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(policy.retry_delay(1, &err), Duration::from_secs(1));
    }

    #[test]
    fn test_conflict_at_either_scope() {
        let both = || (Some("custom"), Some(RetryParams::default()));

        let (r, p) = both();
        let err = RetryPolicyDecision::resolve(&endpoint(r, p), &global(None, None)).unwrap_err();
        assert_eq!(
            err.as_configuration(),
            Some(&ConfigurationError::ConflictingRetryConfig {
                scope: RetryScope::Endpoint
            })
        );

        let (r, p) = both();
        let err = RetryPolicyDecision::resolve(
            &endpoint(None, Some(RetryParams::default())),
            &global(r, p),
        )
        .unwrap_err();
        assert_eq!(
            err.as_configuration(),
            Some(&ConfigurationError::ConflictingRetryConfig {
                scope: RetryScope::Global
            })
        );
    }

    #[test]
    fn test_endpoint_wins_over_global() {
        let decision = RetryPolicyDecision::resolve(
            &endpoint(None, Some(RetryParams::new(10, 20, 2))),
            &global(Some("custom"), None),
        )
        .unwrap();
        assert_eq!(
            decision,
            RetryPolicyDecision::Exponential {
                scope: RetryScope::Endpoint,
                period: Duration::from_millis(10),
                max_period: Duration::from_millis(20),
                max_attempts: 2,
            }
        );

        let decision =
            RetryPolicyDecision::resolve(&endpoint(Some("mine"), None), &global(None, Some(RetryParams::inactive())))
                .unwrap();
        assert_eq!(
            decision,
            RetryPolicyDecision::Custom {
                scope: RetryScope::Endpoint,
                retryer: TypeRef::from("mine"),
            }
        );
    }

    #[test]
    fn test_global_fallthrough_and_default() {
        let decision = RetryPolicyDecision::resolve(&endpoint(None, None), &global(None, Some(RetryParams::inactive())))
            .unwrap();
        assert_eq!(decision, RetryPolicyDecision::Never { scope: RetryScope::Global });

        let decision = RetryPolicyDecision::resolve(&endpoint(None, None), &global(None, None)).unwrap();
        assert_eq!(decision, RetryPolicyDecision::TransportDefault);
        assert_eq!(decision.scope(), None);
    }

    #[test]
    fn test_inactive_ignores_other_parameters() {
        let params = RetryParams {
            active: false,
            period: 1,
            max_period: 2,
            max_attempts: 0,
        };
        let decision = RetryPolicyDecision::resolve(&endpoint(None, Some(params)), &global(None, None)).unwrap();
        assert_eq!(decision, RetryPolicyDecision::Never { scope: RetryScope::Endpoint });
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = RetryPolicyDecision::resolve(
            &endpoint(None, Some(RetryParams::new(100, 1000, 0))),
            &global(None, None),
        )
        .unwrap_err();
        assert!(matches!(
            err.as_configuration(),
            Some(ConfigurationError::InvalidRetry {
                scope: RetryScope::Endpoint,
                ..
            })
        ));
    }
}
