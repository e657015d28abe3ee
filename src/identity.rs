//! Conversation identity: one stable thread id per storage scope.

use anyhow::Result;
use uuid::Uuid;

use crate::storage::{SharedStore, THREAD_KEY};

const THREAD_PREFIX: &str = "case_";

/// Opaque id scoping one conversation (one simulated patient case)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationIdentity(String);

impl ConversationIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads, lazily creates and resets the conversation id in one storage tier.
///
/// Only [`THREAD_KEY`] is ever touched.
#[derive(Clone)]
pub struct IdentityManager {
    store: SharedStore,
}

impl IdentityManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Return the stored id, generating and storing one first if absent
    pub fn get_or_create(&self) -> Result<ConversationIdentity> {
        if let Some(existing) = self.store.get(THREAD_KEY)? {
            if !existing.trim().is_empty() {
                return Ok(ConversationIdentity(existing));
            }
        }

        let fresh = format!("{}{}", THREAD_PREFIX, Uuid::new_v4().simple());
        self.store.set(THREAD_KEY, &fresh)?;
        tracing::info!(thread_id = %fresh, "created conversation identity");
        Ok(ConversationIdentity(fresh))
    }

    /// Forget the stored id. Callers must reinitialize every component holding the old one.
    pub fn reset(&self) -> Result<()> {
        self.store.remove(THREAD_KEY)?;
        tracing::info!("conversation identity reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, USER_KEY};
    use pretty_assertions::{assert_eq, assert_ne};
    use std::sync::Arc;

    #[test]
    fn getter_is_idempotent() {
        let identity = IdentityManager::new(MemoryStore::shared());

        let first = identity.get_or_create().unwrap();
        let second = identity.get_or_create().unwrap();

        assert_eq!(first, second);
        assert!(first.as_str().starts_with(THREAD_PREFIX));
    }

    #[test]
    fn reset_forces_a_new_id() {
        let identity = IdentityManager::new(MemoryStore::shared());
        let before = identity.get_or_create().unwrap();

        identity.reset().unwrap();
        let after = identity.get_or_create().unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn generated_id_is_written_to_the_tier() {
        let store = MemoryStore::shared();
        let identity = IdentityManager::new(store.clone());

        let id = identity.get_or_create().unwrap();

        assert_eq!(store.get(THREAD_KEY).unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn existing_value_is_returned_unchanged() {
        let store = MemoryStore::shared();
        store.set(THREAD_KEY, "case_restored").unwrap();

        let id = IdentityManager::new(store).get_or_create().unwrap();

        assert_eq!(id.as_str(), "case_restored");
    }

    #[test]
    fn reset_leaves_user_record_alone() {
        let store = Arc::new(MemoryStore::new());
        store.set(USER_KEY, "{}").unwrap();
        let identity = IdentityManager::new(store.clone());
        identity.get_or_create().unwrap();

        identity.reset().unwrap();

        assert_eq!(store.get(THREAD_KEY).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn tiers_are_independent() {
        let tab = IdentityManager::new(MemoryStore::shared());
        let durable = IdentityManager::new(MemoryStore::shared());

        assert_ne!(tab.get_or_create().unwrap(), durable.get_or_create().unwrap());
    }
}
