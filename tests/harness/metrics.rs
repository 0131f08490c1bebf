// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outcome metrics for abuse simulation runs.

use std::collections::HashMap;

/// Possible outcomes for a simulated request or message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    RateLimited,
    Challenged,
    MessageBlocked,
    MessageRedacted,
    MessageClean,
}

/// Collects outcomes during an abuse simulation.
#[derive(Debug, Default)]
pub struct AbuseMetrics {
    outcomes: HashMap<Outcome, usize>,
    requests_per_key: HashMap<String, usize>,
}

impl AbuseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn record(&mut self, outcome: Outcome, key: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_key.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn unique_keys(&self) -> usize {
        self.requests_per_key.len()
    }

    /// Ratio of requests that did not pass cleanly.
    pub fn block_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let passed = self.count(Outcome::Allowed) + self.count(Outcome::MessageClean);
        (total - passed) as f64 / total as f64
    }

    /// Ratio of requests allowed through.
    pub fn allowed_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(Outcome::Allowed) as f64 / total as f64
    }

    /// Generate a summary report.
    pub fn report(&self) -> String {
        format!(
            "=== Abuse Simulation Report ===\n\
             Total:            {}\n\
             Allowed:          {}\n\
             Rate limited:     {}\n\
             Challenged:       {}\n\
             Messages blocked: {}\n\
             Messages redacted:{}\n\
             Block rate:       {:.1}%\n\
             Unique keys:      {}",
            self.total(),
            self.count(Outcome::Allowed),
            self.count(Outcome::RateLimited),
            self.count(Outcome::Challenged),
            self.count(Outcome::MessageBlocked),
            self.count(Outcome::MessageRedacted),
            self.block_rate() * 100.0,
            self.unique_keys(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AbuseMetrics::new();
        metrics.record(Outcome::Allowed, "ip:93.0.0.1");
        metrics.record(Outcome::Allowed, "ip:93.0.0.1");
        metrics.record(Outcome::RateLimited, "ip:93.0.0.1");

        assert_eq!(metrics.total(), 3);
        assert_eq!(metrics.count(Outcome::Allowed), 2);
        assert_eq!(metrics.count(Outcome::RateLimited), 1);
        assert_eq!(metrics.unique_keys(), 1);
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = AbuseMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Allowed, "ip:93.0.0.1");
        }
        for _ in 0..7 {
            metrics.record(Outcome::RateLimited, "ip:93.0.0.1");
        }
        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }
}
