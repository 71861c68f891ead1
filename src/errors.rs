//! Hot-reload Error Hierarchy
//!
//! Defines the error types for the watch, dispatch, pool and bring-up layers,
//! categorized by where they are raised and how far they are allowed to travel.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// External key-value store failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Watch session failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Prefix registration and catch-up failures
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Resource pool validation, build and probe failures
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Step scheduler failures
    #[error(transparent)]
    Step(#[from] StepError),

    /// Settings loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Retry timeout after {0:?}")]
    RetryTimeout(Duration),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The client connection was canceled or closed
    #[error("Store connection canceled")]
    ConnCanceled,

    /// Requested revision was compacted away
    #[error("Required revision has been compacted (compact revision {compact_revision})")]
    Compacted { compact_revision: i64 },

    /// Any other error reported on the watch stream
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Stream errors that mean the transport is gone and the watch must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::ConnCanceled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Watcher for {path} is closed")]
    Closed { path: String },

    #[error("Watcher for {path} is already streaming")]
    AlreadyWatching { path: String },

    /// A callback reported an error during catch-up
    #[error("Callback failed at revision {revision}: {source}")]
    Callback {
        revision: i64,
        #[source]
        source: Box<Error>,
    },

    /// A callback panicked; the panic was contained at the boundary
    #[error("Callback panicked: {0}")]
    CallbackPanicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("The key: {prefix} had been bound before")]
    DuplicateBinding { prefix: String },

    #[error("Catch-up for prefix {prefix} failed: {source}")]
    CatchUp {
        prefix: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Store unreachable after {attempts} attempts: {reason}")]
    Connectivity { attempts: usize, reason: String },

    #[error("can not get value of key: {key}")]
    MissingKey { key: String },

    #[error("value of key: {key} is empty")]
    EmptyValue { key: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("[{family}] {name}: payload is not valid json: {source}")]
    Decode {
        family: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("[{family}] {name}: invalid config: {reason}")]
    Validation {
        family: &'static str,
        name: String,
        reason: String,
    },

    #[error("[{family}] {name}: config yields no members")]
    NoMembers { family: &'static str, name: String },

    #[error("[{family}] connect to {endpoint} failed: {reason}")]
    Connect {
        family: &'static str,
        endpoint: String,
        reason: String,
    },

    #[error("[{family}] {name}: probe of {endpoint} failed: {reason}")]
    Probe {
        family: &'static str,
        name: String,
        endpoint: String,
        reason: String,
    },

    #[error("[{family}] can not get pool {name}, registered: {registered:?}")]
    NotFound {
        family: &'static str,
        name: String,
        registered: Vec<String>,
    },

    #[error("[{family}] member request failed: {reason}")]
    Request { family: &'static str, reason: String },

    /// Several independent failures collected into one error
    #[error("{} failure(s): {}", .0.len(), .0.join("; "))]
    Aggregate(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Priority can not be negative: {0}")]
    NegativePriority(i64),

    #[error("Priority {0} is out of range")]
    PriorityOverflow(i64),

    #[error("Action of step {name} can not be empty")]
    MissingAction { name: String },

    #[error("[step {ordinal}/{total}] {name} err: {source}")]
    Failed {
        ordinal: usize,
        total: usize,
        name: String,
        #[source]
        source: Box<Error>,
    },
}
