// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory window state store for rate-limit accounting.
//!
//! State is sharded across a fixed set of locks so that evaluations for the
//! same key serialize while unrelated keys proceed in parallel. Entries are
//! created lazily and reclaimed by an explicit [`WindowStore::sweep`], which
//! the service runs on a fixed interval independent of request traffic.

use crate::clock::Millis;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum backoff level; at level 5 the effective quota bottoms out at
/// `ceil(max/32)`, never zero.
pub const MAX_BACKOFF_LEVEL: u8 = 5;

const SHARD_COUNT: usize = 16;

/// Identity a request is billed against: the authenticated user when there
/// is one, otherwise the client IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    User(String),
    Ip(IpAddr),
}

impl RateKey {
    /// Resolve the billing key for a request. Authenticated identity wins
    /// over the transport address so a user cannot rotate IPs to reset
    /// their quota.
    pub fn resolve(user_id: Option<&str>, ip: IpAddr) -> Self {
        match user_id {
            Some(id) if !id.is_empty() => RateKey::User(id.to_string()),
            _ => RateKey::Ip(ip),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::User(id) => write!(f, "user:{id}"),
            RateKey::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}

/// Mutable per-key accounting state, owned exclusively by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests counted in the current window
    pub count: u32,
    /// When the current window ends (epoch ms)
    pub window_reset_at: Millis,
    /// Progressive penalty level (0..=5)
    pub backoff_level: u8,
}

/// Sharded `RateKey -> WindowState` map.
pub struct WindowStore {
    shards: Vec<RwLock<HashMap<RateKey, WindowState>>>,
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard_for(&self, key: &RateKey) -> &RwLock<HashMap<RateKey, WindowState>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Run a read-modify-write against the state for `key`, holding the
    /// shard lock for the whole operation so concurrent evaluations for the
    /// same key serialize.
    ///
    /// An entry whose window has elapsed is refreshed in place: the count
    /// restarts at zero and a new window opens, but the backoff level is
    /// preserved. Penalties only decay through successful requests, not
    /// through window rollover.
    pub async fn update<R>(
        &self,
        key: &RateKey,
        window_ms: u64,
        now: Millis,
        f: impl FnOnce(&mut WindowState) -> R,
    ) -> R {
        let mut shard = self.shard_for(key).write().await;
        let state = shard.entry(key.clone()).or_insert(WindowState {
            count: 0,
            window_reset_at: now + window_ms,
            backoff_level: 0,
        });
        if state.window_reset_at <= now {
            state.count = 0;
            state.window_reset_at = now + window_ms;
        }
        f(state)
    }

    /// Read the current state for `key` without refreshing it.
    pub async fn peek(&self, key: &RateKey) -> Option<WindowState> {
        self.shard_for(key).read().await.get(key).copied()
    }

    /// Remove expired entries. Keys still carrying a backoff penalty are
    /// kept even after their window lapses, so a burst abuser cannot be
    /// forgotten by going idle until the sweep. Returns the number of
    /// entries removed.
    pub async fn sweep(&self, now: Millis) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.write().await;
            let before = map.len();
            map.retain(|_, state| state.window_reset_at > now || state.backoff_level > 0);
            removed += before - map.len();
        }
        if removed > 0 {
            debug!(removed, "Window store sweep reclaimed entries");
        }
        removed
    }

    /// Number of tracked keys across all shards.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }
}
