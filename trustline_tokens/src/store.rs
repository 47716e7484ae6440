//! Expiry-aware storage for issued tokens

use std::{collections::HashMap, fmt, sync::Arc};

use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use arc_swap::ArcSwap;

use crate::{SecurityToken, TokenCacheKey, TokenCacheKeyRef};

/// A store for issued tokens
///
/// Implementations must never return an entry at or past its absolute expiry.
pub trait TokenStore: Send + Sync {
    /// Whether a live entry exists for the key
    fn contains(&self, key: &TokenCacheKeyRef) -> bool;

    /// Gets the token held for the key, if it has not expired
    fn get(&self, key: &TokenCacheKeyRef) -> Option<Arc<SecurityToken>>;

    /// Adds a token which will expire at `absolute_expiry`
    ///
    /// Returns `false`, leaving the store unchanged, if a live entry already
    /// exists for the key.
    fn add(
        &self,
        key: TokenCacheKey,
        token: Arc<SecurityToken>,
        absolute_expiry: UnixTime,
    ) -> bool;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn contains(&self, key: &TokenCacheKeyRef) -> bool {
        (**self).contains(key)
    }

    fn get(&self, key: &TokenCacheKeyRef) -> Option<Arc<SecurityToken>> {
        (**self).get(key)
    }

    fn add(
        &self,
        key: TokenCacheKey,
        token: Arc<SecurityToken>,
        absolute_expiry: UnixTime,
    ) -> bool {
        (**self).add(key, token, absolute_expiry)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    token: Arc<SecurityToken>,
    expiry: UnixTime,
}

/// An in-memory token store
///
/// Reads are served from an immutable snapshot and never take a lock.
/// Writers publish a new snapshot, dropping any expired entries from it.
pub struct InMemoryTokenStore<C = System> {
    entries: ArcSwap<HashMap<TokenCacheKey, Entry>>,
    minimum_validity: DurationSecs,
    clock: C,
}

impl Default for InMemoryTokenStore {
    /// An empty store using the system clock
    ///
    /// Entries are served until the moment they expire.
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTokenStore {
    /// Constructs a new, empty store
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            minimum_validity: DurationSecs(0),
            clock: System,
        }
    }
}

impl<C> InMemoryTokenStore<C> {
    /// Sets the minimum validity for any token returned by this store
    ///
    /// Entries which will expire within `minimum_validity` are treated as
    /// already expired.
    pub fn with_minimum_validity(mut self, minimum_validity: DurationSecs) -> Self {
        self.minimum_validity = minimum_validity;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> InMemoryTokenStore<D> {
        InMemoryTokenStore {
            entries: self.entries,
            minimum_validity: self.minimum_validity,
            clock,
        }
    }
}

impl<C: Clock> InMemoryTokenStore<C> {
    fn must_be_valid_until(&self) -> UnixTime {
        self.clock.now() + self.minimum_validity
    }

    fn live_entry(&self, key: &TokenCacheKeyRef) -> Option<Arc<SecurityToken>> {
        let cutoff = self.must_be_valid_until();
        self.entries
            .load()
            .get(key)
            .filter(|e| e.expiry > cutoff)
            .map(|e| Arc::clone(&e.token))
    }

    /// The number of live entries
    pub fn len(&self) -> usize {
        let cutoff = self.must_be_valid_until();
        self.entries
            .load()
            .values()
            .filter(|e| e.expiry > cutoff)
            .count()
    }

    /// Whether the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let cutoff = self.must_be_valid_until();
        let mut removed = 0;
        self.entries.rcu(|current| {
            let next: HashMap<_, _> = current
                .iter()
                .filter(|(_, e)| e.expiry > cutoff)
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect();
            removed = current.len() - next.len();
            next
        });

        if removed > 0 {
            tracing::debug!(removed, "purged expired tokens");
        }

        removed
    }
}

impl<C: Clock + Send + Sync> TokenStore for InMemoryTokenStore<C> {
    fn contains(&self, key: &TokenCacheKeyRef) -> bool {
        self.live_entry(key).is_some()
    }

    fn get(&self, key: &TokenCacheKeyRef) -> Option<Arc<SecurityToken>> {
        self.live_entry(key)
    }

    fn add(
        &self,
        key: TokenCacheKey,
        token: Arc<SecurityToken>,
        absolute_expiry: UnixTime,
    ) -> bool {
        let cutoff = self.must_be_valid_until();
        let mut added = false;
        let mut pruned = 0;
        self.entries.rcu(|current| {
            if current.get(&key).map_or(false, |e| e.expiry > cutoff) {
                added = false;
                pruned = 0;
                Arc::clone(current)
            } else {
                added = true;
                let mut next: HashMap<_, _> = current
                    .iter()
                    .filter(|(_, e)| e.expiry > cutoff)
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect();
                pruned = current.len() - next.len();
                next.insert(
                    key.clone(),
                    Entry {
                        token: Arc::clone(&token),
                        expiry: absolute_expiry,
                    },
                );
                Arc::new(next)
            }
        });

        if added {
            tracing::trace!(key = %key, expiry = absolute_expiry.0, pruned, "stored token");
        }

        added
    }
}

impl<C: fmt::Debug> fmt::Debug for InMemoryTokenStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InMemoryTokenStore")
            .field("entries", &self.entries.load().len())
            .field("minimum_validity", &self.minimum_validity)
            .field("clock", &self.clock)
            .finish()
    }
}
