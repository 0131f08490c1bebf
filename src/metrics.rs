// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters for enforcement outcomes.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub requests_allowed: IntCounter,
    pub requests_denied: IntCounter,
    pub challenges_required: IntCounter,
    pub messages_blocked: IntCounter,
    pub messages_redacted: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_allowed = IntCounter::new(
            "trust_filter_requests_allowed_total",
            "Requests allowed by the rate limiter",
        )?;
        let requests_denied = IntCounter::new(
            "trust_filter_requests_denied_total",
            "Requests denied by the rate limiter",
        )?;
        let challenges_required = IntCounter::new(
            "trust_filter_challenges_required_total",
            "Requests escalated to a proof-of-humanity challenge",
        )?;
        let messages_blocked = IntCounter::new(
            "trust_filter_messages_blocked_total",
            "Messages blocked for contact patterns before deposit",
        )?;
        let messages_redacted = IntCounter::new(
            "trust_filter_messages_redacted_total",
            "Deposit-paid messages with over-cap matches redacted",
        )?;

        registry.register(Box::new(requests_allowed.clone()))?;
        registry.register(Box::new(requests_denied.clone()))?;
        registry.register(Box::new(challenges_required.clone()))?;
        registry.register(Box::new(messages_blocked.clone()))?;
        registry.register(Box::new(messages_redacted.clone()))?;

        Ok(Self {
            registry,
            requests_allowed,
            requests_denied,
            challenges_required,
            messages_blocked,
            messages_redacted,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
