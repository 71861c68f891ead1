//! Boundary to the external distributed key-value store.
//!
//! The runtime never talks to a concrete store directly. Everything goes through
//! [`ConfigStore`], which models the three calls the watch protocol needs:
//! a reachability check, a revisioned snapshot read and a resumable watch stream.
//!
//! [`MemStore`] is the in-process adaptor used by tests and the demo binary.

mod mem_store;
pub use mem_store::*;


use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use tracing::info;
use tracing::warn;

use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::RegistryError;
use crate::Result;
use crate::StoreError;

/// Kind of mutation reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Revision of the last modification of this key
    pub mod_revision: i64,
}

#[derive(Debug, Clone, Default)]
pub struct GetResponse {
    pub kvs: Vec<KeyValue>,
    /// Store-wide revision at the time of the read
    pub header_revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub kind: EventKind,
    /// For deletes the value is empty and `mod_revision` is the deleting revision
    pub kv: KeyValue,
}

/// One message of a watch stream
#[derive(Debug, Clone, Default)]
pub struct WatchResponse {
    pub header_revision: i64,
    /// Non-zero when the requested start revision was compacted
    pub compact_revision: i64,
    pub events: Vec<StoreEvent>,
    pub error: Option<StoreError>,
}

impl WatchResponse {
    pub fn failed(
        header_revision: i64,
        error: StoreError,
    ) -> Self {
        let compact_revision = match &error {
            StoreError::Compacted { compact_revision } => *compact_revision,
            _ => 0,
        };
        Self {
            header_revision,
            compact_revision,
            events: Vec::new(),
            error: Some(error),
        }
    }
}

/// Where a new watch stream begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStart {
    /// Only changes made after the stream is established
    Now,
    /// Replay from this revision (inclusive)
    Revision(i64),
}

pub type WatchStream = BoxStream<'static, WatchResponse>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Current store revision; used as the reachability check.
    async fn status(&self) -> Result<i64>;

    /// Snapshot of one key, or of every key under `path` when `prefix` is set.
    async fn get(
        &self,
        path: &str,
        prefix: bool,
    ) -> Result<GetResponse>;

    /// Opens a watch stream. The stream ends when the session is gone.
    async fn watch(
        &self,
        path: &str,
        start: WatchStart,
        prefix: bool,
    ) -> Result<WatchStream>;
}

/// Verifies the store is reachable, retrying with bounded backoff.
///
/// Exhausting the policy is reported as [`RegistryError::Connectivity`].
pub async fn connect_with_retry(
    store: Arc<dyn ConfigStore>,
    policy: BackoffPolicy,
) -> Result<i64> {
    let probe = {
        let store = store.clone();
        move || {
            let store = store.clone();
            async move { store.status().await }
        }
    };

    match task_with_timeout_and_exponential_backoff(probe, policy).await {
        Ok(revision) => {
            info!(revision, "config store reachable");
            Ok(revision)
        }
        Err(e) => {
            warn!("config store unreachable after {} attempts: {}", policy.max_retries, e);
            Err(RegistryError::Connectivity {
                attempts: policy.max_retries,
                reason: e.to_string(),
            }
            .into())
        }
    }
}
