//! Bot lifecycle state machine.
//!
//! `Created → Starting → Started → Stopping → Stopped`, each transition firing its
//! handler exactly once. A stop requested before the gateway reports ready goes
//! straight from `Starting` to `Stopping`.

use crate::error::{BotError, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub fn may_advance_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Created, Starting)
                | (Starting, Started)
                | (Starting, Stopping)
                | (Started, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// Named transition handlers. Returning an error leaves the state machine where it was.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn on_starting(&self) -> Result<()>;
    async fn on_started(&self) -> Result<()>;
    async fn on_stopping(&self) -> Result<()>;
    async fn on_stopped(&self) -> Result<()>;
}

pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Runs the handler for `to` and commits the transition if it succeeds.
    ///
    /// The state lock is held while the handler runs, so a concurrent transition
    /// (e.g. `ready` arriving mid-startup) waits for the current one to settle.
    pub async fn advance<H>(&self, to: LifecycleState, hooks: &H) -> Result<()>
    where
        H: LifecycleHooks + ?Sized,
    {
        let mut state = self.state.lock().await;
        let from = *state;
        if !from.may_advance_to(to) {
            return Err(BotError::Lifecycle { from, to });
        }
        match to {
            LifecycleState::Starting => hooks.on_starting().await?,
            LifecycleState::Started => hooks.on_started().await?,
            LifecycleState::Stopping => hooks.on_stopping().await?,
            LifecycleState::Stopped => hooks.on_stopped().await?,
            // never a valid target, rejected above
            LifecycleState::Created => {}
        }
        tracing::debug!(target = "lifecycle", ?from, ?to, "transition");
        *state = to;
        Ok(())
    }
}
