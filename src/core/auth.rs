//! Authentication gate collaborator.
//!
//! The pipeline only needs a stable identity and session key per caller;
//! how that identity is established lives outside this crate.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Authentication required")]
pub struct AuthRequired;

/// Who is speaking, and the key their cache, history and cancellation hang off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub session_key: String,
}

#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn authenticate(&self) -> Result<Identity, AuthRequired>;
}

/// Gate with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticAuthGate {
    identity: Option<Identity>,
}

impl StaticAuthGate {
    pub fn authenticated(user_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            identity: Some(Identity {
                user_id: user_id.into(),
                session_key: session_key.into(),
            }),
        }
    }

    /// Authenticated as `user_id` with a freshly generated session key.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::authenticated(user_id, Uuid::new_v4().to_string())
    }

    /// Rejects every caller.
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl AuthGate for StaticAuthGate {
    async fn authenticate(&self) -> Result<Identity, AuthRequired> {
        self.identity.clone().ok_or(AuthRequired)
    }
}
