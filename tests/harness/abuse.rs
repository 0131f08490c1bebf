// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Abuse simulation patterns for security testing.

/// Abuse pattern configuration.
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Requests sent per window
    pub requests_per_window: usize,
    /// Number of windows the abuse spans
    pub windows: usize,
    /// Number of distinct rate keys used
    pub unique_keys: usize,
    /// Whether the traffic presents as authenticated
    pub authenticated: bool,
    /// Fraction of requests carrying an automation user-agent (0.0-1.0)
    pub bot_ua_ratio: f64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 50,
            windows: 1,
            unique_keys: 1,
            authenticated: false,
            bot_ua_ratio: 0.0,
        }
    }
}

/// Predefined abuse patterns.
impl AbuseConfig {
    /// One caller hammering a single endpoint inside one window.
    pub fn single_key_flood() -> Self {
        Self {
            requests_per_window: 100,
            ..Default::default()
        }
    }

    /// Burst-idle-burst: the same caller floods several windows in a row,
    /// expecting a fresh quota each time.
    pub fn repeat_offender() -> Self {
        Self {
            requests_per_window: 50,
            windows: 3,
            ..Default::default()
        }
    }

    /// Many IPs each staying under the per-key limit; mitigation at this
    /// layer is per-key only.
    pub fn distributed_scrape() -> Self {
        Self {
            requests_per_window: 150,
            unique_keys: 50,
            bot_ua_ratio: 1.0,
            ..Default::default()
        }
    }

    /// Headless tooling probing a challenge-gated route anonymously.
    pub fn anonymous_probe() -> Self {
        Self {
            requests_per_window: 20,
            bot_ua_ratio: 0.5,
            ..Default::default()
        }
    }

    pub fn total_requests(&self) -> usize {
        self.requests_per_window * self.windows
    }

    pub fn expectations(&self, max_per_window: usize) -> AbuseExpectations {
        if self.unique_keys == 1 {
            // A single key gets at most max_per_window per window, less
            // once backoff kicks in.
            let cap = (max_per_window * self.windows) as f64 / self.total_requests() as f64;
            AbuseExpectations {
                max_allowed_ratio: cap.min(1.0),
                description: "Single key capped at the per-window quota",
            }
        } else {
            AbuseExpectations {
                max_allowed_ratio: 1.0,
                description: "Distributed traffic is only mitigated per key",
            }
        }
    }
}

/// Expected outcome bounds for an abuse pattern.
pub struct AbuseExpectations {
    /// Maximum ratio of requests that should be allowed through
    pub max_allowed_ratio: f64,
    /// Description of expected behavior
    pub description: &'static str,
}
