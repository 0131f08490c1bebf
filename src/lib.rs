// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trust-Boundary Enforcement Layer
//!
//! This crate is the filter between untrusted actors (scrapers, bots,
//! users trying to move deals off-platform) and the charter marketplace
//! core:
//!
//! - Per-identity fixed-window rate limiting with progressive backoff
//! - Stateless suspicion heuristics over request metadata
//! - Challenge escalation for automated-looking traffic
//! - Deposit-gated detection and redaction of contact information in
//!   outbound chat messages
//!
//! Every code path returns a decision value; policy denial is never an
//! error, so the hosting application cannot fail open on an unhandled
//! exception in the filter.

pub mod audit;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod guard;
pub mod handlers;
pub mod heuristics;
pub mod limiter;
pub mod metrics;
pub mod store;

pub use challenge::ChallengeGate;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use guard::{generate_block_message, ContentPatternGuard, MessageValidationResult};
pub use heuristics::SuspicionHeuristics;
pub use limiter::{EndpointPolicy, PolicyRegistry, RateLimitDecision, RateLimiter};
pub use store::{RateKey, WindowStore};
