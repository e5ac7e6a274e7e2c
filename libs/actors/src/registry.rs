//! Actor Registry
//!
//! Logical address → actor reference lookup. Stream clients never hold a
//! coordinator reference up front; they ask the registry for whatever actor
//! currently answers to the coordinator address.

use crate::error::{ActorError, Result};
use crate::system::ActorRef;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    id: Uuid,
}

impl ActorId {
    /// Create new actor ID
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Create from UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self { id }
    }

    /// Get UUID
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.id.simple())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Address book for actors accepting messages of type `M`
///
/// Cloning shares the underlying table.
pub struct ActorRegistry<M> {
    actors: Arc<RwLock<HashMap<String, ActorRef<M>>>>,
}

impl<M: Send + 'static> ActorRegistry<M> {
    pub fn new() -> Self {
        Self {
            actors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind an address to an actor
    ///
    /// Fails if a live actor already owns the address. A binding whose actor
    /// has stopped is silently taken over.
    pub async fn register(&self, address: impl Into<String>, actor: ActorRef<M>) -> Result<()> {
        let address = address.into();
        let mut actors = self.actors.write().await;

        if let Some(existing) = actors.get(&address) {
            if !existing.is_closed() {
                tracing::warn!(
                    address = %address,
                    existing = %existing.id(),
                    "Refusing to register over a live actor"
                );
                return Err(ActorError::AlreadyRegistered { address });
            }
            tracing::debug!(address = %address, stale = %existing.id(), "Replacing stopped actor");
        }

        tracing::debug!(address = %address, actor_id = %actor.id(), "Registering actor");
        actors.insert(address, actor);
        Ok(())
    }

    /// Bind an address unconditionally, returning the previous binding
    pub async fn replace(&self, address: impl Into<String>, actor: ActorRef<M>) -> Option<ActorRef<M>> {
        let address = address.into();
        tracing::debug!(address = %address, actor_id = %actor.id(), "Re-registering actor");
        self.actors.write().await.insert(address, actor)
    }

    /// Resolve an address to a cloneable actor reference
    pub async fn lookup(&self, address: &str) -> Result<ActorRef<M>> {
        self.actors
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| ActorError::not_found(address))
    }

    /// Remove an address binding
    pub async fn unregister(&self, address: &str) -> Option<ActorRef<M>> {
        let removed = self.actors.write().await.remove(address);
        if removed.is_none() {
            tracing::warn!(address = %address, "Attempted to unregister unknown address");
        }
        removed
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.actors.read().await.contains_key(address)
    }

    /// All bound addresses
    pub async fn addresses(&self) -> Vec<String> {
        self.actors.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.actors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actors.read().await.is_empty()
    }
}

impl<M: Send + 'static> Default for ActorRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ActorRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            actors: Arc::clone(&self.actors),
        }
    }
}

impl<M> fmt::Debug for ActorRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRegistry").finish_non_exhaustive()
    }
}

/// Type-erased view of a registry, used by the actor system to release an
/// address when the actor bound to it is stopped
#[async_trait]
pub(crate) trait AddressBook: Send + Sync {
    /// Remove `address` only if it is still bound to `actor`
    async fn release(&self, address: &str, actor: &ActorId);
}

#[async_trait]
impl<M: Send + 'static> AddressBook for ActorRegistry<M> {
    async fn release(&self, address: &str, actor: &ActorId) {
        let mut actors = self.actors.write().await;
        let bound_here = actors
            .get(address)
            .map(|existing| existing.id() == actor)
            .unwrap_or(false);

        if bound_here {
            actors.remove(address);
            tracing::debug!(address = %address, actor_id = %actor, "Released address");
        }
    }
}
