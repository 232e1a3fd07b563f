//! History and audio cache collaborator.
//!
//! The pipeline consumes an [`AudioStore`]; [`MemoryStore`] is the in-process
//! reference implementation. Entries are scoped per session key and addressed
//! by the exact text they were synthesized from.

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

use crate::core::combiner::CombinedAsset;

/// Default number of history entries kept per session
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default number of cached audio entries
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Content address of a stored combined asset.
///
/// The 128-bit xxh3 hash of the exact source text, as 32 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinedHandle(String);

impl CombinedHandle {
    pub fn for_text(text: &str) -> Self {
        Self(format!("{:032x}", xxh3_128(text.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Cached audio for exactly `text`, if any.
    async fn get_cached(&self, session_key: &str, text: &str) -> Option<Bytes>;

    async fn put_cached(&self, session_key: &str, text: &str, audio: Bytes);

    /// Store a combined asset; it also becomes the cached audio for `text`.
    async fn put_combined(
        &self,
        session_key: &str,
        text: &str,
        asset: &CombinedAsset,
    ) -> Result<CombinedHandle, StoreError>;

    async fn has_combined(&self, session_key: &str, text: &str) -> Option<CombinedHandle>;

    /// Move `text` to the front of the session's history, adding it if absent.
    async fn record_history(&self, session_key: &str, text: &str);

    /// Most recent first.
    async fn history(&self, session_key: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    pub capacity: u64,
    pub ttl: Option<Duration>,
    pub history_limit: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

pub struct MemoryStore {
    audio: Cache<String, Bytes>,
    combined: Cache<String, CombinedHandle>,
    history: Mutex<HashMap<String, VecDeque<String>>>,
    history_limit: usize,
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        let mut audio = Cache::builder().max_capacity(config.capacity);
        let mut combined = Cache::builder().max_capacity(config.capacity);
        if let Some(ttl) = config.ttl {
            audio = audio.time_to_live(ttl);
            combined = combined.time_to_live(ttl);
        }

        Self {
            audio: audio.build(),
            combined: combined.build(),
            history: Mutex::new(HashMap::new()),
            history_limit: config.history_limit.max(1),
        }
    }

    fn key(session_key: &str, text: &str) -> String {
        format!("{session_key}:{}", CombinedHandle::for_text(text))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

#[async_trait]
impl AudioStore for MemoryStore {
    async fn get_cached(&self, session_key: &str, text: &str) -> Option<Bytes> {
        self.audio.get(&Self::key(session_key, text)).await
    }

    async fn put_cached(&self, session_key: &str, text: &str, audio: Bytes) {
        debug!(bytes = audio.len(), "Caching audio");
        self.audio.insert(Self::key(session_key, text), audio).await;
    }

    async fn put_combined(
        &self,
        session_key: &str,
        text: &str,
        asset: &CombinedAsset,
    ) -> Result<CombinedHandle, StoreError> {
        let handle = CombinedHandle::for_text(text);
        let key = Self::key(session_key, text);
        self.audio
            .insert(key.clone(), asset.encoded_bytes.clone())
            .await;
        self.combined.insert(key, handle.clone()).await;
        Ok(handle)
    }

    async fn has_combined(&self, session_key: &str, text: &str) -> Option<CombinedHandle> {
        self.combined.get(&Self::key(session_key, text)).await
    }

    async fn record_history(&self, session_key: &str, text: &str) {
        let mut history = self.history.lock();
        let entries = history.entry(session_key.to_string()).or_default();
        entries.retain(|entry| entry != text);
        entries.push_front(text.to_string());
        entries.truncate(self.history_limit);
    }

    async fn history(&self, session_key: &str) -> Vec<String> {
        self.history
            .lock()
            .get(session_key)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}
