//! Session registry for out-of-band cancellation.
//!
//! Maps an opaque session key to a cancellation token shared by every
//! in-flight call made on behalf of that key. Each call holds a
//! [`SessionGuard`] with a child token; cancelling the key cancels all of them.
//! The entry disappears when its last guard is dropped or the key is cancelled.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct SessionEntry {
    generation: u64,
    token: CancellationToken,
    active: usize,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionEntry>>,
    next_generation: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one in-flight call for `session_key`.
    pub fn register(&self, session_key: &str) -> SessionGuard {
        let mut entry = self
            .sessions
            .entry(session_key.to_string())
            .or_insert_with(|| SessionEntry {
                generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                token: CancellationToken::new(),
                active: 0,
            });
        entry.active += 1;

        SessionGuard {
            registry: self.clone(),
            session_key: session_key.to_string(),
            generation: entry.generation,
            token: entry.token.child_token(),
        }
    }

    /// Cancel every in-flight call for `session_key`.
    ///
    /// Returns `true` if anything was registered under the key.
    pub fn cancel(&self, session_key: &str) -> bool {
        match self.sessions.remove(session_key) {
            Some((_, entry)) => {
                info!(
                    session_key = %session_key,
                    active = entry.active,
                    "Cancelling in-flight synthesis sessions"
                );
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of in-flight calls registered under `session_key`.
    pub fn active_sessions(&self, session_key: &str) -> usize {
        self.sessions
            .get(session_key)
            .map(|entry| entry.active)
            .unwrap_or(0)
    }

    fn release(&self, session_key: &str, generation: u64) {
        let removed = self.sessions.remove_if_mut(session_key, |_, entry| {
            if entry.generation != generation {
                return false;
            }
            entry.active = entry.active.saturating_sub(1);
            entry.active == 0
        });
        if removed.is_some() {
            debug!(session_key = %session_key, "Session registry entry released");
        }
    }
}

/// Membership of one call in a session. Dropping it deregisters the call.
pub struct SessionGuard {
    registry: SessionRegistry,
    session_key: String,
    generation: u64,
    token: CancellationToken,
}

impl SessionGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.session_key, self.generation);
    }
}
