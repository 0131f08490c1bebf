// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stateless suspicion heuristics over request metadata.
//!
//! Pattern matching only: no network calls, no per-request state. The rule
//! sets live in configuration, not code, because what counts as suspicious
//! differs per deployment (a service behind a load balancer sees internal
//! forwarding addresses that must not be flagged).

use crate::config::HeuristicsConfig;
use std::net::IpAddr;
use tracing::debug;

/// Classifiers that flag a request as "looks automated".
pub struct SuspicionHeuristics {
    config: HeuristicsConfig,
}

impl SuspicionHeuristics {
    pub fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// Whether the user-agent string matches a known automation marker.
    /// Missing/empty user-agents are flagged by default; real browsers
    /// always send one.
    pub fn is_suspicious_user_agent(&self, ua: Option<&str>) -> bool {
        let ua = match ua {
            Some(s) if !s.trim().is_empty() => s.to_lowercase(),
            _ => {
                if self.config.flag_missing_ua {
                    debug!("Missing user-agent flagged as suspicious");
                    return true;
                }
                return false;
            }
        };

        if let Some(marker) = self
            .config
            .bot_ua_markers
            .iter()
            .find(|marker| ua.contains(marker.as_str()))
        {
            debug!(marker = %marker, "User-agent matched automation marker");
            return true;
        }
        false
    }

    /// Conservative IP reputation proxy in the absence of a reputation
    /// feed: private/reserved ranges plus configured literal prefixes.
    pub fn is_suspicious_ip(&self, ip: IpAddr) -> bool {
        if self.config.flag_private_ranges && is_private_or_reserved(ip) {
            debug!(%ip, "IP in private/reserved range");
            return true;
        }

        let ip_str = ip.to_string();
        if let Some(prefix) = self
            .config
            .suspicious_prefixes
            .iter()
            .find(|prefix| ip_str.starts_with(prefix.as_str()))
        {
            debug!(%ip, prefix = %prefix, "IP matched suspicious prefix");
            return true;
        }
        false
    }
}

fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
