//! Boundary between runtime internals and user supplied callbacks.
//!
//! A callback may fail by returning an error or by panicking, either while the
//! future is being created or while it is polled. Both are turned into a
//! [`Result`] here so no panic ever unwinds into the watcher or registry.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::Result;
use crate::WatchError;

pub(crate) async fn guard_callback<F, Fut, T>(make: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(make)) {
        Ok(fut) => fut,
        Err(payload) => return Err(WatchError::CallbackPanicked(panic_message(&*payload)).into()),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(WatchError::CallbackPanicked(panic_message(&*payload)).into()),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
