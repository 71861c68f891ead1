//! Hot-reloadable resource pools driven by a watched configuration store.
//!
//! Changes under a configuration prefix flow from the store through a
//! [`Watcher`], are dispatched by the [`PrefixRegistry`] to the single
//! [`ConfigConsumer`] that owns the prefix, and end up as atomically swapped
//! pools inside a [`PoolManager`]. [`Engine`] sequences bring-up and shutdown.

mod config;
mod constants;
mod engine;
mod errors;
mod pool;
mod registry;
mod step;
mod store;
mod watch;
pub mod utils;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use pool::*;
pub use registry::*;
pub use step::*;
pub use store::*;
pub use utils::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
