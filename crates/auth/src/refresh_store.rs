//! Server-side registry of live refresh tokens.
//!
//! One mapping per login session: `token -> owning user`. Rotation is a
//! compare-and-swap in a single critical section: the new token is
//! registered only if the old one was still live for that user, so a
//! superseded token is permanently invalid and can never fork the session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use warden_core::UserId;

pub trait RefreshTokenStore: Send + Sync {
    fn add(&self, token: &str, user_id: UserId);
    /// Absence is not an error.
    fn remove(&self, token: &str);
    /// Swap `old_token` for `new_token` iff `old_token` is currently mapped
    /// to `user_id`. Returns `false` (and registers nothing) otherwise.
    fn replace(&self, old_token: &str, new_token: &str, user_id: UserId) -> bool;
    fn valid(&self, token: &str, user_id: UserId) -> bool;
}

impl<S> RefreshTokenStore for Arc<S>
where
    S: RefreshTokenStore + ?Sized,
{
    fn add(&self, token: &str, user_id: UserId) {
        (**self).add(token, user_id)
    }

    fn remove(&self, token: &str) {
        (**self).remove(token)
    }

    fn replace(&self, old_token: &str, new_token: &str, user_id: UserId) -> bool {
        (**self).replace(old_token, new_token, user_id)
    }

    fn valid(&self, token: &str, user_id: UserId) -> bool {
        (**self).valid(token, user_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    inner: RwLock<HashMap<String, UserId>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RefreshTokenStore for InMemoryRefreshTokenStore {
    fn add(&self, token: &str, user_id: UserId) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(token.to_string(), user_id);
        }
    }

    fn remove(&self, token: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(token);
        }
    }

    fn replace(&self, old_token: &str, new_token: &str, user_id: UserId) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        if map.get(old_token) != Some(&user_id) {
            return false;
        }
        map.remove(old_token);
        map.insert(new_token.to_string(), user_id);
        true
    }

    fn valid(&self, token: &str, user_id: UserId) -> bool {
        match self.inner.read() {
            Ok(map) => map.get(token) == Some(&user_id),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn valid_requires_matching_owner() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        store.add("t1", alice);
        assert!(store.valid("t1", alice));
        assert!(!store.valid("t1", bob));
        assert!(!store.valid("missing", alice));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = InMemoryRefreshTokenStore::new();
        let user = UserId::new();
        store.add("t1", user);
        store.remove("t1");
        store.remove("t1");
        assert!(!store.valid("t1", user));
        assert!(store.is_empty());
    }

    #[test]
    fn replace_invalidates_old_and_registers_new() {
        let store = InMemoryRefreshTokenStore::new();
        let user = UserId::new();
        store.add("old", user);
        assert!(store.replace("old", "new", user));

        assert!(!store.valid("old", user));
        assert!(store.valid("new", user));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_of_a_superseded_token_registers_nothing() {
        let store = InMemoryRefreshTokenStore::new();
        let user = UserId::new();
        store.add("old", user);

        assert!(store.replace("old", "first", user));
        assert!(!store.replace("old", "second", user));
        assert!(!store.replace("first", "third", UserId::new()));

        assert!(store.valid("first", user));
        assert!(!store.valid("second", user));
        assert!(!store.valid("third", user));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn racing_rotations_of_one_token_have_a_single_winner() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let user = UserId::new();
        store.add("t0", user);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.replace("t0", &format!("next-{i}"), user))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_observers_never_see_both_or_neither() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let user = UserId::new();
        store.add("t0", user);

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    assert!(store.replace(&format!("t{i}"), &format!("t{}", i + 1), user));
                }
            })
        };

        for _ in 0..2_000 {
            let guard = store.inner.read().unwrap();
            assert_eq!(guard.len(), 1, "exactly one live token at every observation");
        }

        writer.join().unwrap();
        assert!(store.valid("t500", user));
    }
}
