use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;
use tracing::info;

use super::PriorityQueue;
use crate::Result;
use crate::StepError;

/// Deferred, fallible bring-up or shutdown action.
pub type StepAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct StepItem {
    name: String,
    action: StepAction,
}

/// Named actions run one after another, lowest priority first.
///
/// Single use: [`Steps::run`] drains the queue.
#[derive(Default)]
pub struct Steps {
    queue: PriorityQueue<StepItem>,
}

impl std::fmt::Debug for Steps {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Steps").field("pending", &self.queue.len()).finish()
    }
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        priority: i64,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let action: StepAction = Box::new(move || action().boxed());
        self.register_boxed(name, priority, Some(action))
    }

    /// Rejects a negative priority or an absent action without touching the queue.
    pub fn register_boxed(
        &mut self,
        name: impl Into<String>,
        priority: i64,
        action: Option<StepAction>,
    ) -> Result<()> {
        let name = name.into();
        if priority < 0 {
            return Err(StepError::NegativePriority(priority).into());
        }
        let Some(action) = action else {
            return Err(StepError::MissingAction { name }.into());
        };
        self.queue.push(priority, StepItem { name, action });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs every registered step in order and stops at the first failure.
    pub async fn run(&mut self) -> Result<()> {
        let total = self.queue.len();
        let mut ordinal = 1;
        while let Some((_, StepItem { name, action })) = self.queue.pop() {
            if let Err(e) = action().await {
                let err = StepError::Failed {
                    ordinal,
                    total,
                    name,
                    source: Box::new(e),
                };
                error!("{}", err);
                return Err(err.into());
            }
            info!("[step {ordinal}/{total}] {name} success");
            ordinal += 1;
        }
        Ok(())
    }
}
