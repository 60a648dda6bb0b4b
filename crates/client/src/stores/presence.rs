//! Presence store for the online-user set.

use std::collections::BTreeSet;
use std::sync::Arc;

/// Read-only view of who is online.
pub type PresenceSet = Arc<BTreeSet<String>>;

/// Authoritative online-user set, replaced wholesale per snapshot.
///
/// Readers get an `Arc` to an immutable set, so a `replace` is never
/// observed half-applied.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: PresenceSet,
    /// Bumped on every mutation
    revision: u64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the set with a new snapshot. Duplicates collapse.
    pub fn replace<I, S>(&mut self, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = Arc::new(users.into_iter().map(Into::into).collect());
        self.revision += 1;
    }

    /// Forget everything (identity changed).
    pub fn clear(&mut self) {
        if !self.users.is_empty() {
            self.users = PresenceSet::default();
            self.revision += 1;
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> PresenceSet {
        Arc::clone(&self.users)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_before_first_snapshot() {
        let registry = PresenceRegistry::new();
        assert!(registry.current().is_empty());
        assert_eq!(registry.revision(), 0);
    }

    #[test]
    fn replace_does_not_merge() {
        let mut registry = PresenceRegistry::new();
        registry.replace(["u1", "u2"]);
        registry.replace(["u3"]);
        assert_eq!(*registry.current(), set(&["u3"]));
        assert!(!registry.is_online("u1"));
        assert!(registry.is_online("u3"));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let mut registry = PresenceRegistry::new();
        registry.replace(["u1", "u2"]);
        let before = registry.current();
        registry.replace(["u3"]);
        assert_eq!(*before, set(&["u1", "u2"]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicates_collapse() {
        let mut registry = PresenceRegistry::new();
        registry.replace(vec!["u1".to_string(), "u1".to_string(), "u2".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_only_bumps_revision_when_non_empty() {
        let mut registry = PresenceRegistry::new();
        registry.clear();
        assert_eq!(registry.revision(), 0);
        registry.replace(["u1"]);
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.revision(), 2);
    }
}
