// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the trust-boundary filter.
//!
//! Endpoint policies are static data loaded at startup and never mutated at
//! runtime; the defaults cover the marketplace routes that see abuse.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the trust-boundary filter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Interval between expiry sweeps of the window store in seconds
    /// (default: 300)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Per-endpoint rate-limit policies
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyEntry>,

    /// Suspicion heuristics configuration
    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    /// Message content guard configuration
    #[serde(default)]
    pub guard: GuardConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Rate-limit policy for one (HTTP method, route) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// HTTP method, uppercase (e.g. "POST")
    pub method: String,

    /// Route path (e.g. "/api/messages")
    pub path: String,

    /// Counting window duration in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum requests per window before denial
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Whether unauthenticated callers must pass a challenge on this route
    #[serde(default)]
    pub challenge_required: bool,

    /// Whether repeat offenders get their quota progressively halved
    #[serde(default)]
    pub progressive_backoff: bool,
}

/// Configuration for the stateless suspicion heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    /// Lowercase substrings that mark a user-agent as automated
    #[serde(default = "default_bot_markers")]
    pub bot_ua_markers: Vec<String>,

    /// Treat a missing or empty user-agent as suspicious (default: true)
    #[serde(default = "default_true")]
    pub flag_missing_ua: bool,

    /// Flag private/reserved IP ranges as suspicious (default: true).
    /// Deployments behind a load balancer that forwards internal addresses
    /// should disable this.
    #[serde(default = "default_true")]
    pub flag_private_ranges: bool,

    /// Additional literal IP prefixes to flag (e.g. "203.0.113.")
    #[serde(default)]
    pub suspicious_prefixes: Vec<String>,
}

/// Configuration for the outbound message content guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Email addresses allowed per message once a deposit is paid
    #[serde(default = "default_max_emails")]
    pub max_emails_with_deposit: usize,

    /// Phone numbers allowed per message once a deposit is paid
    #[serde(default = "default_max_phones")]
    pub max_phones_with_deposit: usize,

    /// Message prefix length folded into the audit digest
    #[serde(default = "default_audit_prefix_len")]
    pub audit_prefix_len: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    30
}

fn default_policies() -> Vec<PolicyEntry> {
    vec![
        // Chat is the circumvention channel; squeeze repeat offenders.
        PolicyEntry {
            method: "POST".to_string(),
            path: "/api/messages".to_string(),
            window_ms: 60_000,
            max_requests: 20,
            challenge_required: false,
            progressive_backoff: true,
        },
        PolicyEntry {
            method: "POST".to_string(),
            path: "/api/auth/login".to_string(),
            window_ms: 60_000,
            max_requests: 5,
            challenge_required: true,
            progressive_backoff: true,
        },
        PolicyEntry {
            method: "POST".to_string(),
            path: "/api/quotes".to_string(),
            window_ms: 60_000,
            max_requests: 10,
            challenge_required: true,
            progressive_backoff: true,
        },
        // Listing search is the scraper target.
        PolicyEntry {
            method: "GET".to_string(),
            path: "/api/search".to_string(),
            window_ms: 60_000,
            max_requests: 30,
            challenge_required: true,
            progressive_backoff: false,
        },
    ]
}

fn default_bot_markers() -> Vec<String> {
    [
        "bot",
        "crawler",
        "spider",
        "scraper",
        "curl",
        "wget",
        "python-requests",
        "python-urllib",
        "go-http-client",
        "java/",
        "libwww",
        "headless",
        "phantomjs",
        "selenium",
        "puppeteer",
        "playwright",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_emails() -> usize {
    2
}

fn default_max_phones() -> usize {
    1
}

fn default_audit_prefix_len() -> usize {
    32
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sweep_interval_secs: default_sweep_interval_secs(),
            policies: default_policies(),
            heuristics: HeuristicsConfig::default(),
            guard: GuardConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            bot_ua_markers: default_bot_markers(),
            flag_missing_ua: default_true(),
            flag_private_ranges: default_true(),
            suspicious_prefixes: Vec::new(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_emails_with_deposit: default_max_emails(),
            max_phones_with_deposit: default_max_phones(),
            audit_prefix_len: default_audit_prefix_len(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Get the sweep interval duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
