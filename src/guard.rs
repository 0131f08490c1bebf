// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outbound message content guard.
//!
//! Detects contact/circumvention artifacts (emails, phone numbers,
//! messaging-app handles, scheduling links, social handles, meeting links,
//! third-party booking sites) in chat messages. Before a deposit is paid,
//! any match blocks the message; after a deposit, matches are released up
//! to a per-class cap and the overflow is redacted.
//!
//! Patterns deliberately err broad: over-blocking protects platform
//! revenue, a missed contact exchange does not.

use crate::clock::Clock;
use crate::config::GuardConfig;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Guard construction errors.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid content pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Category of contact/circumvention artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatternClass {
    Email,
    Phone,
    Whatsapp,
    Booking,
    Social,
    ExternalMeeting,
    DirectBookingUrl,
}

impl PatternClass {
    /// Uppercase label used in redaction markers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Whatsapp => "WHATSAPP",
            Self::Booking => "BOOKING",
            Self::Social => "SOCIAL",
            Self::ExternalMeeting => "MEETING",
            Self::DirectBookingUrl => "BOOKING URL",
        }
    }

    /// Human-readable plural used in the user-facing block notice.
    fn describe(&self) -> &'static str {
        match self {
            Self::Email => "email addresses",
            Self::Phone => "phone numbers",
            Self::Whatsapp => "messaging app contacts",
            Self::Booking => "scheduling links",
            Self::Social => "social media handles",
            Self::ExternalMeeting => "external meeting links",
            Self::DirectBookingUrl => "direct booking links",
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detected artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ContentMatch {
    pub class: PatternClass,
    pub matched_text: String,
}

/// Result of validating one message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageValidationResult {
    pub is_valid: bool,
    /// Matches that were blocked or redacted
    pub blocked_patterns: Vec<ContentMatch>,
    /// Present iff `is_valid`; on the blocked path callers must use
    /// [`generate_block_message`] instead, so partial contact fragments
    /// never leak.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_message: Option<String>,
    /// Privacy-preserving digest for audit correlation
    pub audit_hash: String,
}

/// Per-class detector: compiled matcher plus redaction policy data.
struct PatternRule {
    class: PatternClass,
    regex: Regex,
    /// Matches released per message once a deposit is paid; overflow gets
    /// a LIMIT REACHED marker. Zero means the class stays fully redacted
    /// even post-deposit.
    deposit_cap: usize,
}

/// Stateless message classifier with a compiled pattern table.
pub struct ContentPatternGuard {
    rules: Vec<PatternRule>,
    config: GuardConfig,
    clock: Arc<dyn Clock>,
}

impl ContentPatternGuard {
    /// Compile the pattern table once at startup.
    ///
    /// Scheduling links and third-party booking sites keep a cap of zero:
    /// those circumvent commission even after a deposit, unlike direct
    /// contact details which the deposit gate releases.
    pub fn new(config: GuardConfig, clock: Arc<dyn Clock>) -> Result<Self, GuardError> {
        let table: [(PatternClass, &str, usize); 7] = [
            (
                PatternClass::Email,
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
                config.max_emails_with_deposit,
            ),
            (
                PatternClass::Phone,
                r"\+?\d[\d\s().\-]{5,}\d",
                config.max_phones_with_deposit,
            ),
            (
                PatternClass::Whatsapp,
                r"(?i)whats\s?app|wa\.me/\S+|t\.me/\S+|telegram|signal\.me/\S+|viber|wechat",
                1,
            ),
            (
                PatternClass::Booking,
                r"(?i)(?:calendly\.com|cal\.com|acuityscheduling\.com|youcanbook\.me|doodle\.com|picktime\.com)\S*",
                0,
            ),
            (
                PatternClass::Social,
                r"(?i)(?:(?:instagram|facebook|linkedin|tiktok|twitter|x)\.com|fb\.me)/\S+|\b(?:insta|instagram|facebook|linkedin|tiktok)\b\s*[:@]\s*@?[A-Za-z0-9_.]{2,}",
                1,
            ),
            (
                PatternClass::ExternalMeeting,
                r"(?i)(?:zoom\.us|meet\.google\.com|teams\.microsoft\.com|webex\.com|gotomeeting\.com|whereby\.com)\S*",
                1,
            ),
            (
                PatternClass::DirectBookingUrl,
                r"(?i)(?:avinode\.com|stratajet\.com|jettly\.com|privatefly\.com|victor\.aero|jetsmarter\.com|villiersjets\.com)\S*",
                0,
            ),
        ];

        let mut rules = Vec::with_capacity(table.len());
        for (class, pattern, deposit_cap) in table {
            rules.push(PatternRule {
                class,
                regex: Regex::new(pattern)?,
                deposit_cap,
            });
        }

        Ok(Self {
            rules,
            config,
            clock,
        })
    }

    /// Classify one message against every pattern class.
    ///
    /// Without a deposit, any match of any class invalidates the message
    /// and every matched span is redacted in the working copy, though the
    /// sanitized text is withheld from the result on that path. With a
    /// deposit, the message is always valid and only overflow beyond each
    /// class cap is redacted.
    pub fn validate(&self, text: &str, has_deposit: bool) -> MessageValidationResult {
        let mut blocked = Vec::new();
        let mut redactions: Vec<(Range<usize>, String)> = Vec::new();

        for rule in &self.rules {
            let matches = rule.find_matches(text);
            for (index, (span, matched)) in matches.into_iter().enumerate() {
                if has_deposit && index < rule.deposit_cap {
                    continue;
                }
                let marker = if has_deposit {
                    format!("[{} BLOCKED - LIMIT REACHED]", rule.class.label())
                } else {
                    format!("[{} BLOCKED]", rule.class.label())
                };
                redactions.push((span, marker));
                blocked.push(ContentMatch {
                    class: rule.class,
                    matched_text: matched,
                });
            }
        }

        // Spans index the original text, so apply them right to left; a
        // span overlapping one already redacted is dropped rather than
        // spliced into the marker.
        let mut sanitized = text.to_string();
        redactions.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut cursor = sanitized.len();
        for (span, marker) in redactions {
            if span.end > cursor {
                continue;
            }
            cursor = span.start;
            sanitized.replace_range(span, &marker);
        }

        let is_valid = has_deposit || blocked.is_empty();
        if !blocked.is_empty() {
            debug!(
                blocked = blocked.len(),
                has_deposit, is_valid, "Message matched contact patterns"
            );
        }

        MessageValidationResult {
            is_valid,
            audit_hash: self.audit_hash(text, has_deposit),
            sanitized_message: if is_valid { Some(sanitized) } else { None },
            blocked_patterns: blocked,
        }
    }

    /// Stable digest of (length, deposit flag, truncated prefix,
    /// timestamp) so audit records correlate without storing message
    /// bodies.
    fn audit_hash(&self, text: &str, has_deposit: bool) -> String {
        let prefix: String = text.chars().take(self.config.audit_prefix_len).collect();
        let mut hasher = Sha256::new();
        hasher.update(text.len().to_le_bytes());
        hasher.update([has_deposit as u8]);
        hasher.update(prefix.as_bytes());
        hasher.update(self.clock.now_millis().to_le_bytes());
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl PatternRule {
    fn find_matches(&self, text: &str) -> Vec<(Range<usize>, String)> {
        self.regex
            .find_iter(text)
            .filter(|m| self.accept(m.as_str()))
            .map(|m| (m.range(), m.as_str().to_string()))
            .collect()
    }

    /// Post-filter on raw regex candidates. Phone candidates need at least
    /// seven digits so bare years and prices don't trip the guard; link
    /// classes log the normalized host for the audit trail.
    fn accept(&self, matched: &str) -> bool {
        match self.class {
            PatternClass::Phone => matched.chars().filter(|c| c.is_ascii_digit()).count() >= 7,
            PatternClass::Booking | PatternClass::ExternalMeeting | PatternClass::DirectBookingUrl => {
                if let Some(host) = normalize_link_host(matched) {
                    debug!(class = %self.class, host = %host, "Detected off-platform link");
                }
                true
            }
            _ => true,
        }
    }
}

/// Pull a lowercase host out of a detected link, tolerating a missing
/// scheme.
fn normalize_link_host(matched: &str) -> Option<String> {
    let candidate = if matched.contains("://") {
        matched.to_string()
    } else {
        format!("https://{matched}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Build the user-facing policy notice for a blocked message.
///
/// Deduplicates pattern classes and never echoes matched text, so the
/// notice itself cannot leak the redacted contact data.
pub fn generate_block_message(matches: &[ContentMatch]) -> String {
    let mut seen = Vec::new();
    for m in matches {
        if !seen.contains(&m.class) {
            seen.push(m.class);
        }
    }
    if seen.is_empty() {
        return "Message blocked by platform policy.".to_string();
    }
    let listed = seen
        .iter()
        .map(|c| c.describe())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Your message was not sent because it appears to contain: {listed}. \
         Contact details can be exchanged once the deposit for this booking \
         has been paid."
    )
}
