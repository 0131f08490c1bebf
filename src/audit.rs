// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Audit trail and collaborator contracts.
//!
//! Every deny, redaction, and challenge decision produces an
//! [`AuditEvent`]. Delivery is fire-and-forget from this layer's point of
//! view; the sink owns its own guarantees.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// Category of enforcement outcome being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    RateLimitDenied,
    ChallengeRequired,
    MessageBlocked,
    MessageRedacted,
}

/// Structured record of one enforcement decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    /// Rate key or user id the decision applied to
    pub subject: String,
    /// Denial reason, block notice, or audit hash
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for enforcement decisions.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Production sink: structured log lines, picked up by the platform's log
/// pipeline.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event.kind {
            AuditKind::RateLimitDenied | AuditKind::MessageBlocked => warn!(
                kind = ?event.kind,
                subject = %event.subject,
                detail = %event.detail,
                timestamp = %event.timestamp,
                "Enforcement decision"
            ),
            AuditKind::ChallengeRequired | AuditKind::MessageRedacted => info!(
                kind = ?event.kind,
                subject = %event.subject,
                detail = %event.detail,
                timestamp = %event.timestamp,
                "Enforcement decision"
            ),
        }
    }
}

/// Test sink that retains events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Deposit oracle failure; callers treat any error as "no access".
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("deposit status unavailable: {0}")]
    Unavailable(String),
}

/// Payment/deposit status contract. The payment-intent lookup behind it is
/// out of scope; this layer only consumes the boolean and fails secure.
pub trait DepositOracle: Send + Sync {
    fn has_deposit_access(&self, user_id: &str, deal_id: &str) -> Result<bool, OracleError>;
}

/// Fail-secure default used until a real oracle is wired in deployment.
#[derive(Debug, Default)]
pub struct DenyAllOracle;

impl DepositOracle for DenyAllOracle {
    fn has_deposit_access(&self, _user_id: &str, _deal_id: &str) -> Result<bool, OracleError> {
        Ok(false)
    }
}
