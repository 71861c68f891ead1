//! Prefix Dispatch Registry.
//!
//! Routes store changes under a configuration prefix to exactly one owning
//! [`ConfigConsumer`]. Registration performs a synchronous catch-up read and
//! then hands the prefix over to a background watch subscription.

mod config_cache;
mod notation;
mod prefix_registry;

pub use config_cache::*;
pub use notation::*;
pub use prefix_registry::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Receiver of configuration changes for one dotted prefix.
///
/// Keys are delivered in dotted notation, prefix included
/// (`watch.redis.cacheA` for a consumer of `watch.redis`).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigConsumer: Send + Sync + 'static {
    async fn on_put(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()>;

    async fn on_delete(
        &self,
        key: &[u8],
    ) -> Result<()>;

    /// Dotted prefix this consumer owns, e.g. `watch.redis`
    fn prefix(&self) -> String;
}
