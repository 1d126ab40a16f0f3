//! Typed dependency container handed to command modules.
//!
//! Keys are serenity `TypeMapKey`s, so a capability is declared the same way shared
//! state is declared for a serenity `Context`. Unlike `ctx.data`, the registry is an
//! ordinary value: the controller owns one, clones it into the gateway handler and
//! command modules, and tests build their own.

use crate::error::{BotError, Result};
use serenity::prelude::{RwLock, TypeMap, TypeMapKey};
use std::sync::Arc;

#[derive(Clone)]
pub struct DependencyRegistry {
    inner: Arc<RwLock<TypeMap>>,
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TypeMap::new())),
        }
    }

    /// Registers `value` under `K`, replacing any earlier instance.
    pub async fn set<K: TypeMapKey>(&self, value: K::Value) {
        self.inner.write().await.insert::<K>(value);
        tracing::debug!(target = "registry", key = std::any::type_name::<K>(), "dependency set");
    }

    pub async fn get<K>(&self) -> Option<K::Value>
    where
        K: TypeMapKey,
        K::Value: Clone,
    {
        self.inner.read().await.get::<K>().cloned()
    }

    /// Like [`get`](Self::get), but a missing key is an error naming the key.
    pub async fn require<K>(&self) -> Result<K::Value>
    where
        K: TypeMapKey,
        K::Value: Clone,
    {
        self.get::<K>()
            .await
            .ok_or(BotError::MissingDependency(short_type_name::<K>()))
    }

    pub async fn contains<K: TypeMapKey>(&self) -> bool {
        self.inner.read().await.contains_key::<K>()
    }

    pub async fn remove<K: TypeMapKey>(&self) -> Option<K::Value> {
        self.inner.write().await.remove::<K>()
    }
}

fn short_type_name<K>() -> &'static str {
    let full = std::any::type_name::<K>();
    full.rsplit("::").next().unwrap_or(full)
}
