//! Explicit context handed to sessions at construction

use crate::room::PlayerId;
use crate::settings::Settings;
use crate::store::RoomStore;
use std::sync::Arc;

/// How a party signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Guest,
    Registered,
}

/// Signed-in party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: PlayerId,
    pub kind: IdentityKind,
}

impl Identity {
    /// Anonymous guest with a random id
    pub fn guest() -> Self {
        Self {
            id: PlayerId(format!("guest-{:08x}", rand::random::<u32>())),
            kind: IdentityKind::Guest,
        }
    }

    pub fn registered(id: &str) -> Self {
        Self {
            id: PlayerId::new(id),
            kind: IdentityKind::Registered,
        }
    }
}

/// Identity, store handle and settings for one signed-in party
#[derive(Debug)]
pub struct Context<S> {
    pub identity: Identity,
    pub store: Arc<S>,
    pub settings: Arc<Settings>,
}

// Derive would require `S: Clone`
impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S: RoomStore> Context<S> {
    pub fn new(identity: Identity, store: Arc<S>, settings: Arc<Settings>) -> Self {
        Self {
            identity,
            store,
            settings,
        }
    }

    /// Same store and settings, different party
    pub fn with_identity(&self, identity: Identity) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_guests_get_distinct_ids() {
        let a = Identity::guest();
        let b = Identity::guest();
        assert_eq!(a.kind, IdentityKind::Guest);
        assert!(a.id.0.starts_with("guest-"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_contexts_share_store() {
        let ctx = Context::new(
            Identity::registered("alice"),
            Arc::new(MemoryStore::new()),
            Arc::new(Settings::default()),
        );
        let other = ctx.with_identity(Identity::registered("bob"));
        assert!(Arc::ptr_eq(&ctx.store, &other.store));
        assert_eq!(other.identity.id, PlayerId::new("bob"));
    }
}
