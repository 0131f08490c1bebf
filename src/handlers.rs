// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP handlers for the trust-boundary filter service.
//!
//! The filter runs as an external auth service: the marketplace's edge
//! middleware calls `/check` before letting a request through, and the
//! chat delivery path calls `/validate-message` before sending a message.
//! Responses are always 200 with a decision body so the caller can read
//! the verdict.

use crate::audit::{AuditEvent, AuditKind, AuditSink, DepositOracle};
use crate::challenge::ChallengeGate;
use crate::clock::{Clock, Millis};
use crate::config::Config;
use crate::guard::{generate_block_message, ContentPatternGuard};
use crate::limiter::{PolicyRegistry, RateLimitDecision, RateLimiter};
use crate::metrics::Metrics;
use crate::store::RateKey;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub gate: ChallengeGate,
    pub guard: ContentPatternGuard,
    pub policies: PolicyRegistry,
    pub audit: Arc<dyn AuditSink>,
    pub oracle: Arc<dyn DepositOracle>,
    pub metrics: Metrics,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Rate limit check request from the edge middleware.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub ip: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Rate limit check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: Millis,
    pub require_challenge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Message validation request from the chat delivery path.
#[derive(Debug, Deserialize)]
pub struct ValidateMessageRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub deal_id: Option<String>,
    /// When absent, the deposit oracle is consulted (errors fail secure).
    #[serde(default)]
    pub has_deposit: Option<bool>,
}

/// Message validation response.
#[derive(Debug, Serialize)]
pub struct ValidateMessageResponse {
    pub is_valid: bool,
    /// Present only when the message may be delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_message: Option<String>,
    /// User-facing policy notice on the blocked path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_notice: Option<String>,
    pub blocked_classes: Vec<String>,
    pub audit_hash: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "charter-trust-filter",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Rate-limit and challenge decision for one inbound request.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    debug!(
        ip = %req.ip,
        method = %req.method,
        path = %req.path,
        authenticated = req.authenticated,
        "Processing rate limit check"
    );

    let ip = match req.ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            warn!(ip = %req.ip, "Invalid IP address format");
            return (
                StatusCode::BAD_REQUEST,
                Json(CheckResponse {
                    allowed: false,
                    remaining: 0,
                    reset_at_ms: 0,
                    require_challenge: false,
                    reason: Some("Invalid IP address format".to_string()),
                }),
            );
        }
    };

    let key = RateKey::resolve(req.user_id.as_deref(), ip);

    let decision = match state.policies.lookup(&req.method, &req.path) {
        Some(policy) => state.limiter.evaluate(&key, policy).await,
        None => {
            // Fail open: an unregistered route is a configuration gap,
            // not a security incident.
            warn!(
                method = %req.method,
                path = %req.path,
                "No rate-limit policy registered for route"
            );
            RateLimitDecision::unrestricted(state.clock.now_millis())
        }
    };

    let require_challenge = state.gate.should_challenge(
        &decision,
        req.user_agent.as_deref(),
        ip,
        req.authenticated,
    );

    if decision.allowed {
        state.metrics.requests_allowed.inc();
    } else {
        state.metrics.requests_denied.inc();
        state.audit.record(AuditEvent::new(
            AuditKind::RateLimitDenied,
            key.to_string(),
            decision.reason.clone().unwrap_or_default(),
        ));
    }
    if require_challenge {
        state.metrics.challenges_required.inc();
        if decision.allowed {
            state.audit.record(AuditEvent::new(
                AuditKind::ChallengeRequired,
                key.to_string(),
                format!("{} {}", req.method, req.path),
            ));
        }
    }

    if !decision.allowed {
        info!(key = %key, path = %req.path, "Request denied by rate limit");
    }

    (
        StatusCode::OK,
        Json(CheckResponse {
            allowed: decision.allowed,
            remaining: decision.remaining,
            reset_at_ms: decision.reset_at,
            require_challenge,
            reason: decision.reason,
        }),
    )
}

/// Content guard decision for one outbound chat message.
pub async fn validate_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateMessageRequest>,
) -> impl IntoResponse {
    let has_deposit = match req.has_deposit {
        Some(flag) => flag,
        None => {
            let user_id = req.user_id.as_deref().unwrap_or_default();
            let deal_id = req.deal_id.as_deref().unwrap_or_default();
            match state.oracle.has_deposit_access(user_id, deal_id) {
                Ok(flag) => flag,
                Err(err) => {
                    // Fail secure: without a confirmed deposit, contact
                    // details stay gated.
                    warn!(error = %err, "Deposit oracle unavailable, assuming no access");
                    false
                }
            }
        }
    };

    let result = state.guard.validate(&req.message, has_deposit);
    let subject = req
        .user_id
        .as_deref()
        .map(|id| format!("user:{id}"))
        .unwrap_or_else(|| "user:unknown".to_string());

    let block_notice = if result.is_valid {
        if !result.blocked_patterns.is_empty() {
            state.metrics.messages_redacted.inc();
            state.audit.record(AuditEvent::new(
                AuditKind::MessageRedacted,
                subject,
                result.audit_hash.clone(),
            ));
        }
        None
    } else {
        state.metrics.messages_blocked.inc();
        state.audit.record(AuditEvent::new(
            AuditKind::MessageBlocked,
            subject,
            result.audit_hash.clone(),
        ));
        Some(generate_block_message(&result.blocked_patterns))
    };

    let blocked_classes = result
        .blocked_patterns
        .iter()
        .map(|m| m.class.label().to_string())
        .collect();

    (
        StatusCode::OK,
        Json(ValidateMessageResponse {
            is_valid: result.is_valid,
            sanitized_message: result.sanitized_message,
            block_notice,
            blocked_classes,
            audit_hash: result.audit_hash,
        }),
    )
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    if !state.config.metrics.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    (StatusCode::OK, state.metrics.encode()).into_response()
}
