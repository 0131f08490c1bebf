// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-window rate limiter with progressive backoff.
//!
//! Each (method, route) pair carries an [`EndpointPolicy`]; requests are
//! billed to a [`RateKey`] (user id or client IP). A plain fixed window is
//! gameable at window boundaries, so policies can enable progressive
//! backoff: every denial halves the effective quota (floor 1), every clean
//! request restores one step. An attacker who keeps tripping the limit is
//! squeezed tighter while a caller who backs off is rehabilitated
//! gradually.

use crate::clock::{Clock, Millis};
use crate::config::PolicyEntry;
use crate::store::{RateKey, WindowStore, MAX_BACKOFF_LEVEL};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable rate-limit policy for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPolicy {
    /// Counting window duration in milliseconds
    pub window_ms: u64,
    /// Maximum requests per window
    pub max_requests: u32,
    /// Whether unauthenticated callers must pass a challenge here
    pub challenge_required: bool,
    /// Whether denials shrink the quota exponentially
    pub progressive_backoff: bool,
}

impl EndpointPolicy {
    /// Quota after applying the backoff penalty: halved per level with a
    /// hard floor of one request so a key is never fully locked out.
    pub fn effective_max(&self, backoff_level: u8) -> u32 {
        if self.progressive_backoff {
            (self.max_requests >> backoff_level.min(MAX_BACKOFF_LEVEL)).max(1)
        } else {
            self.max_requests
        }
    }
}

/// Outcome of one rate-limit evaluation. Immutable once constructed;
/// denial is a normal return value, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends (epoch ms)
    pub reset_at: Millis,
    /// Whether the endpoint policy demands a challenge for anonymous callers
    pub require_challenge: bool,
    /// Stable machine-parseable denial reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RateLimitDecision {
    /// Decision for a route with no registered policy: fail open rather
    /// than closed, so forgetting to register a route never blocks traffic.
    /// The caller is expected to log a configuration warning.
    pub fn unrestricted(now: Millis) -> Self {
        Self {
            allowed: true,
            remaining: 0,
            reset_at: now,
            require_challenge: false,
            reason: None,
        }
    }
}

/// Static `(method, route) -> EndpointPolicy` mapping, built once at
/// startup from configuration.
pub struct PolicyRegistry {
    routes: HashMap<(String, String), EndpointPolicy>,
}

impl PolicyRegistry {
    pub fn new(entries: &[PolicyEntry]) -> Self {
        let routes = entries
            .iter()
            .map(|e| {
                (
                    (e.method.to_uppercase(), e.path.clone()),
                    EndpointPolicy {
                        window_ms: e.window_ms,
                        max_requests: e.max_requests,
                        challenge_required: e.challenge_required,
                        progressive_backoff: e.progressive_backoff,
                    },
                )
            })
            .collect();
        Self { routes }
    }

    pub fn lookup(&self, method: &str, path: &str) -> Option<&EndpointPolicy> {
        self.routes
            .get(&(method.to_uppercase(), path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The rate-limit decision engine.
pub struct RateLimiter {
    store: Arc<WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Evaluate a request using the injected clock.
    pub async fn evaluate(&self, key: &RateKey, policy: &EndpointPolicy) -> RateLimitDecision {
        self.evaluate_at(key, policy, self.clock.now_millis()).await
    }

    /// Evaluate a request at an explicit time.
    ///
    /// The whole read-modify-write runs inside one store update, so two
    /// concurrent evaluations for the same key see a serialized view of
    /// `count` and `backoff_level`.
    pub async fn evaluate_at(
        &self,
        key: &RateKey,
        policy: &EndpointPolicy,
        now: Millis,
    ) -> RateLimitDecision {
        let decision = self
            .store
            .update(key, policy.window_ms, now, |state| {
                let effective_max = policy.effective_max(state.backoff_level);

                if state.count >= effective_max {
                    if policy.progressive_backoff && state.backoff_level < MAX_BACKOFF_LEVEL {
                        state.backoff_level += 1;
                    }
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: state.window_reset_at,
                        require_challenge: policy.challenge_required,
                        reason: Some(format!(
                            "Rate limit exceeded. Max {} requests per {} seconds.",
                            policy.max_requests,
                            policy.window_ms / 1000
                        )),
                    }
                } else {
                    state.count += 1;
                    // One clean request buys back one backoff step; recovery
                    // is gradual so burst-idle-burst cycles stay squeezed.
                    if policy.progressive_backoff && state.backoff_level > 0 {
                        state.backoff_level -= 1;
                    }
                    RateLimitDecision {
                        allowed: true,
                        remaining: effective_max - state.count,
                        reset_at: state.window_reset_at,
                        require_challenge: policy.challenge_required,
                        reason: None,
                    }
                }
            })
            .await;

        if decision.allowed {
            debug!(key = %key, remaining = decision.remaining, "Request allowed");
        } else {
            info!(
                key = %key,
                reset_at = decision.reset_at,
                "Request rate limited"
            );
        }
        decision
    }

    /// Hand the store to the background sweep task.
    pub fn store(&self) -> Arc<WindowStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::net::IpAddr;

    fn limiter(clock: &ManualClock) -> RateLimiter {
        RateLimiter::new(Arc::new(WindowStore::new()), Arc::new(clock.clone()))
    }

    fn ip_key(addr: &str) -> RateKey {
        RateKey::Ip(addr.parse::<IpAddr>().unwrap())
    }

    const PLAIN: EndpointPolicy = EndpointPolicy {
        window_ms: 60_000,
        max_requests: 3,
        challenge_required: false,
        progressive_backoff: false,
    };

    const PROGRESSIVE: EndpointPolicy = EndpointPolicy {
        window_ms: 60_000,
        max_requests: 3,
        challenge_required: false,
        progressive_backoff: true,
    };

    #[tokio::test]
    async fn test_quota_exhaustion_without_backoff() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);
        let key = ip_key("1.2.3.4");

        // Scenario A: remaining counts down 2, 1, 0 then denial.
        for expected_remaining in [2, 1, 0] {
            let d = limiter.evaluate(&key, &PLAIN).await;
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = limiter.evaluate(&key, &PLAIN).await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(
            d.reason.as_deref(),
            Some("Rate limit exceeded. Max 3 requests per 60 seconds.")
        );
    }

    #[tokio::test]
    async fn test_window_reset_restores_quota() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);
        let key = ip_key("1.2.3.4");

        for _ in 0..4 {
            limiter.evaluate(&key, &PLAIN).await;
        }
        assert!(!limiter.evaluate(&key, &PLAIN).await.allowed);

        clock.advance(60_001);
        let d = limiter.evaluate(&key, &PLAIN).await;
        assert!(d.allowed);
        assert_eq!(d.remaining, PLAIN.max_requests - 1);
    }

    #[tokio::test]
    async fn test_backoff_halves_quota_across_windows() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);
        let key = ip_key("1.2.3.4");

        // Exhaust the window and take one denial (backoff 0 -> 1).
        for _ in 0..3 {
            assert!(limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
        }
        assert!(!limiter.evaluate(&key, &PROGRESSIVE).await.allowed);

        // Scenario B: next window's quota is max(1, 3/2) = 1.
        clock.advance(60_001);
        let d = limiter.evaluate(&key, &PROGRESSIVE).await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 0, "effective max shrank to 1");
    }

    #[tokio::test]
    async fn test_backoff_floor_never_locks_out() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);
        let key = ip_key("1.2.3.4");

        // Pile up denials far past the level cap.
        for _ in 0..20 {
            limiter.evaluate(&key, &PROGRESSIVE).await;
        }

        // Even at max backoff a fresh window still admits one request.
        clock.advance(60_001);
        assert!(limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
    }

    #[tokio::test]
    async fn test_recovery_is_one_step_per_success() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);
        let key = ip_key("1.2.3.4");
        let store = limiter.store();

        for _ in 0..3 {
            assert!(limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
        }
        assert!(!limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
        assert_eq!(store.peek(&key).await.unwrap().backoff_level, 1);

        // Another denial in the same window deepens the penalty.
        assert!(!limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
        assert_eq!(store.peek(&key).await.unwrap().backoff_level, 2);

        // One clean request in the next window buys back exactly one step.
        clock.advance(60_001);
        assert!(limiter.evaluate(&key, &PROGRESSIVE).await.allowed);
        assert_eq!(store.peek(&key).await.unwrap().backoff_level, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_evaluations_admit_exactly_the_quota() {
        let clock = ManualClock::new(0);
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(WindowStore::new()),
            Arc::new(clock.clone()),
        ));
        let key = ip_key("1.2.3.4");

        // 32 racing requests for one key against a quota of 3: evaluations
        // for the same key serialize, so exactly the quota passes and the
        // stored count never exceeds it.
        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = Arc::clone(&limiter);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                limiter.evaluate(&key, &PLAIN).await.allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, PLAIN.max_requests);

        let state = limiter.store().peek(&key).await.unwrap();
        assert_eq!(state.count, PLAIN.max_requests);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_keys_keep_independent_quotas() {
        let clock = ManualClock::new(0);
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(WindowStore::new()),
            Arc::new(clock.clone()),
        ));

        // 16 keys each spend their full quota at the same time; per-key
        // serialization must not bleed one key's count into another's.
        let mut handles = Vec::new();
        for n in 0..16u8 {
            for _ in 0..PLAIN.max_requests {
                let limiter = Arc::clone(&limiter);
                handles.push(tokio::spawn(async move {
                    let key = ip_key(&format!("10.0.0.{n}"));
                    limiter.evaluate(&key, &PLAIN).await.allowed
                }));
            }
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let clock = ManualClock::new(0);
        let limiter = limiter(&clock);

        for _ in 0..4 {
            limiter.evaluate(&ip_key("1.2.3.4"), &PLAIN).await;
        }
        assert!(!limiter.evaluate(&ip_key("1.2.3.4"), &PLAIN).await.allowed);
        assert!(limiter.evaluate(&ip_key("5.6.7.8"), &PLAIN).await.allowed);
    }

    #[test]
    fn test_registry_lookup_is_method_insensitive() {
        let registry = PolicyRegistry::new(&crate::config::Config::default().policies);
        assert!(registry.lookup("post", "/api/messages").is_some());
        assert!(registry.lookup("GET", "/api/search").is_some());
        assert!(registry.lookup("GET", "/api/unregistered").is_none());
    }

    #[test]
    fn test_unrestricted_decision_fails_open() {
        let d = RateLimitDecision::unrestricted(42);
        assert!(d.allowed);
        assert!(!d.require_challenge);
        assert_eq!(d.reset_at, 42);
    }

    #[test]
    fn test_effective_max_floor() {
        assert_eq!(PROGRESSIVE.effective_max(0), 3);
        assert_eq!(PROGRESSIVE.effective_max(1), 1);
        assert_eq!(PROGRESSIVE.effective_max(5), 1);
        let wide = EndpointPolicy {
            max_requests: 100,
            ..PROGRESSIVE
        };
        assert_eq!(wide.effective_max(5), 3); // 100 >> 5
        assert_eq!(PLAIN.effective_max(5), 3); // no backoff configured
    }
}
