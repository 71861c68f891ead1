//! Resumable watch sessions over the external store.
//!
//! A [`Watcher`] turns the store's raw notification stream into an ordered
//! sequence of [`ChangeEvent`]s. It reconnects on soft stream errors (revision
//! compaction, transient failures) from the last revision it has seen, and
//! stops for good once the store connection is canceled.

mod watcher;
pub use watcher::*;


use crate::EventKind;

/// A single put or delete observed under a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub key: Vec<u8>,
    /// Empty for deletes
    pub value: Vec<u8>,
    pub revision: i64,
}

impl ChangeEvent {
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Lifecycle of a watch session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Close requested, background loop still winding down
    Closing,
    Closed,
}
