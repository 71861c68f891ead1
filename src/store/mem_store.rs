use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use tracing::trace;

use super::ConfigStore;
use super::EventKind;
use super::GetResponse;
use super::KeyValue;
use super::StoreEvent;
use super::WatchResponse;
use super::WatchStart;
use super::WatchStream;
use crate::KeyNotation;
use crate::Result;
use crate::StoreError;

/// In-process store with etcd-like revision semantics.
///
/// Every mutation bumps a single store-wide revision. Mutations are kept in a
/// history until compacted so that watch sessions can resume from an older
/// revision. Fault injection hooks let tests drive the watch error paths.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    inner: Arc<MemStoreInner>,
}

#[derive(Debug, Default)]
struct MemStoreInner {
    state: Mutex<MemState>,
    unavailable: AtomicBool,
    next_session_id: AtomicU64,
}

#[derive(Debug, Default)]
struct MemState {
    revision: i64,
    compact_revision: i64,
    data: BTreeMap<Vec<u8>, KeyValue>,
    history: Vec<StoreEvent>,
    sessions: HashMap<u64, Session>,
}

#[derive(Debug)]
struct Session {
    path: Vec<u8>,
    prefix: bool,
    sender: mpsc::UnboundedSender<WatchResponse>,
}

impl Session {
    fn matches(
        &self,
        key: &[u8],
    ) -> bool {
        matches_path(&self.path, self.prefix, key)
    }
}

fn matches_path(
    path: &[u8],
    prefix: bool,
    key: &[u8],
) -> bool {
    if prefix {
        key.starts_with(path)
    } else {
        key == path
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated from dotted keys scoped under `project`.
    pub fn with_seed<'a>(
        project: &str,
        seed: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let store = Self::new();
        let notation = KeyNotation::new(project);
        for (key, value) in seed {
            store.put(notation.to_external_key(key), value.as_bytes());
        }
        store
    }

    /// Writes a key and returns the new store revision.
    pub fn put(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> i64 {
        let mut state = self.inner.state.lock();
        state.revision += 1;
        let kv = KeyValue {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
            mod_revision: state.revision,
        };
        state.data.insert(kv.key.clone(), kv.clone());
        let event = StoreEvent { kind: EventKind::Put, kv };
        Self::publish(&mut state, event);
        state.revision
    }

    /// Deletes a key; returns the deleting revision, or `None` if the key was absent.
    pub fn delete(
        &self,
        key: impl AsRef<[u8]>,
    ) -> Option<i64> {
        let mut state = self.inner.state.lock();
        state.data.remove(key.as_ref())?;
        state.revision += 1;
        let event = StoreEvent {
            kind: EventKind::Delete,
            kv: KeyValue {
                key: key.as_ref().to_vec(),
                value: Vec::new(),
                mod_revision: state.revision,
            },
        };
        Self::publish(&mut state, event);
        Some(state.revision)
    }

    pub fn revision(&self) -> i64 {
        self.inner.state.lock().revision
    }

    /// Drops history up to and including `revision`.
    pub fn compact(
        &self,
        revision: i64,
    ) {
        let mut state = self.inner.state.lock();
        let revision = revision.min(state.revision);
        if revision <= state.compact_revision {
            return;
        }
        state.compact_revision = revision;
        state.history.retain(|e| e.kv.mod_revision > revision);
        debug!(revision, "mem store compacted");
    }

    /// While unavailable every call fails with [`StoreError::Unavailable`].
    pub fn set_available(
        &self,
        available: bool,
    ) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Terminates all watch sessions with a connection-canceled error.
    pub fn cancel_watches(&self) {
        self.fail_sessions(StoreError::ConnCanceled);
    }

    /// Terminates all watch sessions with `error`.
    pub fn inject_watch_error(
        &self,
        error: StoreError,
    ) {
        self.fail_sessions(error);
    }

    /// Number of live watch sessions.
    pub fn session_count(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.sessions.retain(|_, s| !s.sender.is_closed());
        state.sessions.len()
    }

    fn fail_sessions(
        &self,
        error: StoreError,
    ) {
        let mut state = self.inner.state.lock();
        let revision = state.revision;
        for (_, session) in state.sessions.drain() {
            let _ = session.sender.send(WatchResponse::failed(revision, error.clone()));
        }
    }

    fn publish(
        state: &mut MemState,
        event: StoreEvent,
    ) {
        let revision = state.revision;
        state.sessions.retain(|id, session| {
            if !session.matches(&event.kv.key) {
                return !session.sender.is_closed();
            }
            let response = WatchResponse {
                header_revision: revision,
                compact_revision: 0,
                events: vec![event.clone()],
                error: None,
            };
            let delivered = session.sender.send(response).is_ok();
            if !delivered {
                trace!(session = id, "dropping closed watch session");
            }
            delivered
        });
        state.history.push(event);
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mem store marked unavailable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemStore {
    async fn status(&self) -> Result<i64> {
        self.check_available()?;
        Ok(self.revision())
    }

    async fn get(
        &self,
        path: &str,
        prefix: bool,
    ) -> Result<GetResponse> {
        self.check_available()?;
        let state = self.inner.state.lock();
        let path = path.as_bytes();
        let kvs = state
            .data
            .values()
            .filter(|kv| matches_path(path, prefix, &kv.key))
            .cloned()
            .collect();
        Ok(GetResponse {
            kvs,
            header_revision: state.revision,
        })
    }

    async fn watch(
        &self,
        path: &str,
        start: WatchStart,
        prefix: bool,
    ) -> Result<WatchStream> {
        self.check_available()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock();

        if let WatchStart::Revision(from) = start {
            if state.compact_revision > 0 && from <= state.compact_revision {
                let compacted = StoreError::Compacted {
                    compact_revision: state.compact_revision,
                };
                let _ = sender.send(WatchResponse::failed(state.revision, compacted));
                return Ok(UnboundedReceiverStream::new(receiver).boxed());
            }

            let replay: Vec<StoreEvent> = state
                .history
                .iter()
                .filter(|e| e.kv.mod_revision >= from && matches_path(path.as_bytes(), prefix, &e.kv.key))
                .cloned()
                .collect();
            if !replay.is_empty() {
                let _ = sender.send(WatchResponse {
                    header_revision: state.revision,
                    compact_revision: 0,
                    events: replay,
                    error: None,
                });
            }
        }

        let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        state.sessions.insert(
            id,
            Session {
                path: path.as_bytes().to_vec(),
                prefix,
                sender,
            },
        );
        trace!(session = id, path, ?start, "watch session opened");

        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
