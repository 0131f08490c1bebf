// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Challenge escalation: decides whether a request must satisfy an
//! interactive proof-of-humanity step before proceeding.
//!
//! This is a pure function over already-computed signals (the rate-limit
//! decision, the suspicion heuristics, the auth state). It holds no state
//! of its own and never performs verification; the hosting application
//! calls its challenge verifier only when this gate says so.

use crate::heuristics::SuspicionHeuristics;
use crate::limiter::RateLimitDecision;
use std::net::IpAddr;
use tracing::debug;

pub struct ChallengeGate {
    heuristics: SuspicionHeuristics,
}

impl ChallengeGate {
    pub fn new(heuristics: SuspicionHeuristics) -> Self {
        Self { heuristics }
    }

    /// First matching row wins:
    ///
    /// | condition                                   | challenge |
    /// |---------------------------------------------|-----------|
    /// | unauthenticated on a challenge-gated route  | yes       |
    /// | automated-looking user-agent                | yes       |
    /// | suspicious client IP                        | yes       |
    /// | request was denied by the rate limiter      | yes       |
    /// | otherwise                                   | no        |
    pub fn should_challenge(
        &self,
        decision: &RateLimitDecision,
        ua: Option<&str>,
        ip: IpAddr,
        authenticated: bool,
    ) -> bool {
        if !authenticated && decision.require_challenge {
            debug!(%ip, "Challenge: anonymous caller on challenge-gated route");
            return true;
        }
        if self.heuristics.is_suspicious_user_agent(ua) {
            debug!(%ip, "Challenge: suspicious user-agent");
            return true;
        }
        if self.heuristics.is_suspicious_ip(ip) {
            debug!(%ip, "Challenge: suspicious IP");
            return true;
        }
        if !decision.allowed {
            debug!(%ip, "Challenge: rate limit exceeded");
            return true;
        }
        false
    }
}
