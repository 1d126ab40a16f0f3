//! Component-interaction client (buttons, menus).
//!
//! Handlers are keyed by custom-id "family", the text before the first `_`
//! (`profile_refresh` belongs to `profile`). The client only routes while open;
//! a client that is not event-managed is opened and closed by whoever owns it,
//! never by the gateway.

use crate::error::{BotError, Result};
use crate::registry::DependencyRegistry;
use async_trait::async_trait;
use serenity::model::application::ComponentInteraction;
use serenity::prelude::{Context, TypeMapKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait ComponentHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        deps: &DependencyRegistry,
    ) -> Result<()>;
}

pub struct ComponentClient {
    event_managed: bool,
    open: AtomicBool,
    handlers: RwLock<HashMap<String, Arc<dyn ComponentHandler>>>,
}

/// Registry key for the shared component client.
pub struct ComponentClientKey;

impl TypeMapKey for ComponentClientKey {
    type Value = Arc<ComponentClient>;
}

/// `profile_refresh` -> `profile`.
pub fn family_of(custom_id: &str) -> &str {
    custom_id.split('_').next().unwrap_or("")
}

impl ComponentClient {
    pub fn new(event_managed: bool) -> Self {
        Self {
            event_managed,
            open: AtomicBool::new(false),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the gateway's own lifecycle should open and close this client.
    pub fn is_event_managed(&self) -> bool {
        self.event_managed
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            tracing::info!(target = "components", "component client opened");
        }
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::info!(target = "components", "component client closed");
        }
    }

    pub fn register(&self, family: &str, handler: Arc<dyn ComponentHandler>) -> Result<()> {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if handlers.contains_key(family) {
            return Err(BotError::DuplicateRegistration(format!("component family `{family}`")));
        }
        handlers.insert(family.to_string(), handler);
        Ok(())
    }

    /// The handler that would receive `custom_id`, or `None` while closed.
    pub fn resolve(&self, custom_id: &str) -> Option<Arc<dyn ComponentHandler>> {
        if !self.is_open() {
            return None;
        }
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(family_of(custom_id))
            .cloned()
    }

    /// Routes a component interaction. Returns whether a handler ran.
    pub async fn handle(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        deps: &DependencyRegistry,
    ) -> Result<bool> {
        let cid = component.data.custom_id.as_str();
        let Some(handler) = self.resolve(cid) else {
            tracing::debug!(target = "components", cid, open = self.is_open(), "component not routed");
            return Ok(false);
        };
        handler.handle(ctx, component, deps).await?;
        Ok(true)
    }
}
