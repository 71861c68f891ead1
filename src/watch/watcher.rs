use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ChangeEvent;
use super::SessionState;
use crate::panic_guard::guard_callback;
use crate::ConfigStore;
use crate::EventKind;
use crate::Result;
use crate::StoreError;
use crate::WatchConfig;
use crate::WatchError;
use crate::WatchStart;
use crate::WatchStream;

/// Ordered stream of live events produced by [`Watcher::watch`].
pub type ChangeStream = ReceiverStream<ChangeEvent>;

/// One watch session against a single path (or path prefix).
///
/// The session keeps the highest revision it has observed and resumes from
/// `revision + 1` whenever the underlying stream has to be reopened, so a
/// consumer sees every change exactly once and in revision order.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    path: String,
    prefix: bool,
    store: Arc<dyn ConfigStore>,
    config: WatchConfig,
    revision: AtomicI64,
    state: Mutex<SessionState>,
    streaming: AtomicBool,
    /// Set once a snapshot read or a status call has pinned the starting revision
    synced: AtomicBool,
    token: CancellationToken,
}

/// How one iteration of the watch loop ended
enum LoopOutcome {
    /// Close requested, transport gone, or receiver dropped
    Exit,
    /// Periodic forced restart
    Restart,
    /// Recoverable stream failure
    Soft(StoreError),
}

impl std::fmt::Debug for Watcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("path", &self.inner.path)
            .field("prefix", &self.inner.prefix)
            .field("revision", &self.revision())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    pub fn new(
        path: impl Into<String>,
        prefix: bool,
        store: Arc<dyn ConfigStore>,
        config: WatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                path: path.into(),
                prefix,
                store,
                config,
                revision: AtomicI64::new(0),
                state: Mutex::new(SessionState::Open),
                streaming: AtomicBool::new(false),
                synced: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn is_prefix(&self) -> bool {
        self.inner.prefix
    }

    /// Highest revision observed so far; never decreases.
    pub fn revision(&self) -> i64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Snapshot read of everything under the path, as `Put` events.
    pub async fn get(&self) -> Result<Vec<ChangeEvent>> {
        self.ensure_open()?;
        let resp = self.inner.store.get(&self.inner.path, self.inner.prefix).await?;
        self.inner.advance(resp.header_revision);
        self.inner.synced.store(true, Ordering::SeqCst);

        Ok(resp
            .kvs
            .into_iter()
            .map(|kv| ChangeEvent {
                kind: EventKind::Put,
                key: kv.key,
                value: kv.value,
                revision: kv.mod_revision,
            })
            .collect())
    }

    /// [`Watcher::get`] followed by `f` for each event, in order.
    ///
    /// Stops at the first callback failure; a panicking callback is reported
    /// as an error instead of unwinding into the caller.
    pub async fn get_with_callback<F, Fut>(
        &self,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(ChangeEvent) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        for event in self.get().await? {
            let revision = event.revision;
            guard_callback(|| f(event)).await.map_err(|e| WatchError::Callback {
                revision,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Starts the background watch loop and returns its event stream.
    ///
    /// The stream ends when the watcher is closed or the store connection is
    /// canceled. Only one stream may be taken per watcher.
    pub fn watch(&self) -> Result<ChangeStream> {
        self.ensure_open()?;
        if self.inner.streaming.swap(true, Ordering::SeqCst) {
            return Err(WatchError::AlreadyWatching {
                path: self.inner.path.clone(),
            }
            .into());
        }

        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run(tx).await;
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Runs [`Watcher::watch`] in the background and feeds every event to `f`.
    ///
    /// Errors and panics from `f` are logged and the subscription carries on.
    pub fn watch_with_callback<F, Fut>(
        &self,
        mut f: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnMut(ChangeEvent) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let mut events = self.watch()?;
        let path = self.inner.path.clone();

        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let revision = event.revision;
                if let Err(e) = guard_callback(|| f(event)).await {
                    error!(path, revision, "watch event handler error: {}", e);
                }
            }
            debug!(path, "watch callback subscription ended");
        }))
    }

    /// Cancels the session and closes the event stream. Safe to call repeatedly
    /// from any task; never waits for the loop to wind down.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if *state != SessionState::Open {
            return;
        }
        *state = if self.inner.streaming.load(Ordering::SeqCst) {
            SessionState::Closing
        } else {
            SessionState::Closed
        };
        self.inner.token.cancel();
        debug!(path = self.inner.path, "watcher close requested");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state() != SessionState::Open {
            return Err(WatchError::Closed {
                path: self.inner.path.clone(),
            }
            .into());
        }
        Ok(())
    }
}

impl WatcherInner {
    fn advance(
        &self,
        revision: i64,
    ) {
        self.revision.fetch_max(revision, Ordering::SeqCst);
    }

    async fn run(
        self: Arc<Self>,
        tx: mpsc::Sender<ChangeEvent>,
    ) {
        debug!(path = self.path, "start watch");

        let period = self.config.restart_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut soft_restarts: u32 = 0;

        loop {
            let outcome = match self.pin_start().await {
                Some(Ok(floor)) => {
                    let start = WatchStart::Revision(floor + 1);
                    let opened = tokio::select! {
                        _ = self.token.cancelled() => break,
                        opened = self.store.watch(&self.path, start, self.prefix) => opened,
                    };
                    match opened {
                        Ok(stream) => self.pump(stream, floor, &mut ticker, &tx, &mut soft_restarts).await,
                        Err(e) => Self::open_failure(e),
                    }
                }
                Some(Err(e)) => Self::open_failure(e),
                None => break,
            };

            match outcome {
                LoopOutcome::Exit => break,
                LoopOutcome::Restart => {
                    debug!(path = self.path, revision = self.revision.load(Ordering::SeqCst), "restart watcher");
                }
                LoopOutcome::Soft(e) => {
                    soft_restarts += 1;
                    self.log_soft_restart(&e, soft_restarts);
                    if matches!(e, StoreError::Compacted { .. }) {
                        continue;
                    }
                    tokio::select! {
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_delay()) => {}
                    }
                }
            }
        }

        *self.state.lock() = SessionState::Closed;
        self.token.cancel();
        debug!(path = self.path, "watch quit");
    }

    /// Revision the next session resumes after.
    ///
    /// Without a prior snapshot read the store's current revision is pinned
    /// once, so changes made while a session is being reopened are replayed.
    /// `None` means the watcher was closed while waiting.
    async fn pin_start(&self) -> Option<Result<i64>> {
        if !self.synced.load(Ordering::SeqCst) {
            let status = tokio::select! {
                _ = self.token.cancelled() => return None,
                status = self.store.status() => status,
            };
            match status {
                Ok(revision) => {
                    self.advance(revision);
                    self.synced.store(true, Ordering::SeqCst);
                    debug!(path = self.path, revision, "watch start revision pinned");
                }
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(self.revision.load(Ordering::SeqCst)))
    }

    fn open_failure(e: crate::Error) -> LoopOutcome {
        match e {
            crate::Error::Store(e) if e.is_fatal() => LoopOutcome::Exit,
            e => LoopOutcome::Soft(StoreError::Other(e.to_string())),
        }
    }

    /// Forwards one stream's events until it ends, errors, or a restart is due.
    async fn pump(
        &self,
        mut stream: WatchStream,
        floor: i64,
        ticker: &mut Interval,
        tx: &mpsc::Sender<ChangeEvent>,
        soft_restarts: &mut u32,
    ) -> LoopOutcome {
        loop {
            let resp = tokio::select! {
                _ = self.token.cancelled() => return LoopOutcome::Exit,
                _ = ticker.tick() => return LoopOutcome::Restart,
                resp = stream.next() => resp,
            };

            let Some(resp) = resp else {
                return LoopOutcome::Soft(StoreError::Other("watch stream ended".to_string()));
            };

            if resp.compact_revision > 0 {
                self.advance(resp.compact_revision);
            }

            if let Some(e) = resp.error {
                if e.is_fatal() {
                    warn!(path = self.path, "client connection is closing");
                    return LoopOutcome::Exit;
                }
                return LoopOutcome::Soft(e);
            }

            for event in resp.events {
                if event.kv.mod_revision <= floor {
                    trace!(path = self.path, revision = event.kv.mod_revision, "skip already applied event");
                    continue;
                }
                let change = ChangeEvent {
                    kind: event.kind,
                    key: event.kv.key,
                    value: event.kv.value,
                    revision: event.kv.mod_revision,
                };
                trace!(path = self.path, "receive event: {:?}", change);

                let revision = change.revision;
                tokio::select! {
                    _ = self.token.cancelled() => return LoopOutcome::Exit,
                    sent = tx.send(change) => {
                        if sent.is_err() {
                            debug!(path = self.path, "event receiver dropped");
                            return LoopOutcome::Exit;
                        }
                    }
                }
                self.advance(revision);
            }

            self.advance(resp.header_revision);
            *soft_restarts = 0;
        }
    }

    fn log_soft_restart(
        &self,
        e: &StoreError,
        count: u32,
    ) {
        let revision = self.revision.load(Ordering::SeqCst);
        if count >= self.config.soft_restart_escalation {
            error!(path = self.path, revision, count, "watch keeps restarting: {}", e);
        } else if matches!(e, StoreError::Compacted { .. }) {
            info!(path = self.path, revision, "revision compacted, resuming watch: {}", e);
        } else {
            warn!(path = self.path, revision, count, "watch restarting after error: {}", e);
        }
    }
}
