//! Process bring-up and shutdown orchestration.
//!
//! Pre-run steps bring subsystems up in priority order, the service future is
//! driven until it ends or a shutdown signal arrives, then post-run steps tear
//! things down. Priorities below [`USER_STEP_OFFSET`] are reserved for the
//! built-in steps wired by the binary.


use std::future::Future;

use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;

use crate::constants::USER_STEP_OFFSET;
use crate::Error;
use crate::Result;
use crate::StepError;
use crate::Steps;

/// Conventional priority tiers for user steps. Any non-negative number works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tier(pub i64);

impl Tier {
    pub const HIGH: Tier = Tier(1);
    pub const MID: Tier = Tier(10);
    pub const LOW: Tier = Tier(100);
}

impl From<i64> for Tier {
    fn from(priority: i64) -> Self {
        Tier(priority)
    }
}

fn user_priority(tier: Tier) -> Result<i64> {
    if tier.0 < 0 {
        return Err(StepError::NegativePriority(tier.0).into());
    }
    tier.0
        .checked_add(USER_STEP_OFFSET)
        .ok_or_else(|| StepError::PriorityOverflow(tier.0).into())
}

#[derive(Debug, Default)]
pub struct Engine {
    pre_run: Steps,
    post_run: Steps,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built-in bring-up step. Built-in priorities stay below 100.
    pub fn reg_core_pre_run<F, Fut>(
        &mut self,
        name: &str,
        priority: i64,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.pre_run.register(name, priority, action)
    }

    pub fn reg_core_post_run<F, Fut>(
        &mut self,
        name: &str,
        priority: i64,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.post_run.register(name, priority, action)
    }

    /// User bring-up step; always runs after the built-in ones.
    pub fn reg_pre_run<F, Fut>(
        &mut self,
        name: &str,
        tier: impl Into<Tier>,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let priority = user_priority(tier.into())?;
        self.pre_run.register(name, priority, action)
    }

    pub fn reg_post_run<F, Fut>(
        &mut self,
        name: &str,
        tier: impl Into<Tier>,
        action: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let priority = user_priority(tier.into())?;
        self.post_run.register(name, priority, action)
    }

    /// Runs until `serve` returns or the process receives SIGINT / SIGTERM.
    pub async fn run<S>(
        self,
        serve: S,
    ) -> Result<()>
    where
        S: Future<Output = Result<()>>,
    {
        self.run_until(serve, shutdown_signal()).await
    }

    /// Like [`Engine::run`] with a caller supplied shutdown trigger.
    ///
    /// Post-run steps execute even when `serve` failed; the serve error wins.
    pub async fn run_until<S, Q>(
        mut self,
        serve: S,
        shutdown: Q,
    ) -> Result<()>
    where
        S: Future<Output = Result<()>>,
        Q: Future<Output = Result<()>>,
    {
        self.pre_run.run().await?;
        info!("Application started. Waiting for shutdown signal...");

        let served = tokio::select! {
            result = serve => result,
            signal = shutdown => {
                info!("Shutdown server..");
                signal
            }
        };
        if let Err(e) = &served {
            error!("serve stopped: {:?}", e);
        }

        let teardown = self.post_run.run().await;
        served?;
        teardown?;
        info!("Shutdown completed");
        Ok(())
    }
}

async fn shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("install SIGINT handler: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("install SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}
