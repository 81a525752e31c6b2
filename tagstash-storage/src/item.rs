//! Cache item with lazily materialized state.
//!
//! An item handed out by the pool is usually bound to a pending fetch rather
//! than a concrete value: the first call to `is_hit`, `value`, or
//! `previous_tags` runs the fetch exactly once and memoizes the outcome. The
//! body is an explicit tri-state (`Unresolved(fetch) | Hit(value) | Miss`);
//! expiration and tag sets are separate fields because callers can mutate
//! them independently of the fetch.
//!
//! Tag sets are disjoint in origin: `previous_tags` holds what storage had
//! when the item was fetched, `tags` holds only what the caller attached this
//! session. `set` cancels a pending fetch, so an item that is overwritten
//! before it ever resolved reports no previous tags.

use chrono::Utc;
use std::collections::BTreeSet;
use std::fmt;

use tagstash_core::{CacheKey, CacheResult, CacheValue, Tag, Timestamp};

/// Fetch operation an item may be bound to; runs at most once.
pub(crate) type FetchFn = Box<dyn FnOnce() -> CacheResult<FetchOutcome> + Send>;

/// What a fetch found in storage.
pub(crate) enum FetchOutcome {
    Miss,
    Hit {
        value: CacheValue,
        tags: BTreeSet<String>,
        expires_at: Option<Timestamp>,
    },
}

enum ItemState {
    Unresolved(FetchFn),
    Hit(CacheValue),
    Miss,
}

/// A single cached key/value record with tags and expiration.
pub struct CacheItem {
    key: CacheKey,
    state: ItemState,
    previous_tags: BTreeSet<String>,
    tags: BTreeSet<String>,
    expiration: Option<Timestamp>,
}

impl CacheItem {
    /// Construct an item bound to a pending fetch.
    pub(crate) fn pending(key: CacheKey, fetch: FetchFn) -> Self {
        Self {
            key,
            state: ItemState::Unresolved(fetch),
            previous_tags: BTreeSet::new(),
            tags: BTreeSet::new(),
            expiration: None,
        }
    }

    /// Construct an already-resolved miss placeholder.
    #[cfg(test)]
    pub(crate) fn miss(key: CacheKey) -> Self {
        Self {
            key,
            state: ItemState::Miss,
            previous_tags: BTreeSet::new(),
            tags: BTreeSet::new(),
            expiration: None,
        }
    }

    /// The item's key, immutable for its lifetime.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Replace the value and mark the item a hit.
    ///
    /// Cancels a pending fetch: the stored state is irrelevant once the
    /// caller has decided on a new value.
    pub fn set(&mut self, value: impl Into<CacheValue>) -> &mut Self {
        self.state = ItemState::Hit(value.into());
        self
    }

    /// The stored value, or `None` when the lookup is not a live hit.
    pub fn value(&mut self) -> CacheResult<Option<&CacheValue>> {
        if !self.is_hit()? {
            return Ok(None);
        }
        match &self.state {
            ItemState::Hit(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Whether the lookup found a live value.
    ///
    /// Resolves a pending fetch first; a present value with an expiration in
    /// the past is a miss.
    pub fn is_hit(&mut self) -> CacheResult<bool> {
        self.resolve()?;
        if !matches!(self.state, ItemState::Hit(_)) {
            return Ok(false);
        }
        Ok(match self.expiration {
            Some(when) => when > Utc::now(),
            None => true,
        })
    }

    /// Set the absolute expiration instant; `None` means never expires.
    pub fn expires_at(&mut self, when: Option<Timestamp>) -> &mut Self {
        self.expiration = when;
        self
    }

    /// Expire after a duration from now; `None` means never expires.
    ///
    /// Zero or negative durations are legal and mean "already expired".
    /// Durations that would overflow the timestamp range saturate to the
    /// representable extreme instead of panicking.
    pub fn expires_after(&mut self, ttl: Option<chrono::Duration>) -> &mut Self {
        self.expiration = ttl.map(|d| {
            Utc::now().checked_add_signed(d).unwrap_or(if d > chrono::Duration::zero() {
                chrono::DateTime::<Utc>::MAX_UTC
            } else {
                chrono::DateTime::<Utc>::MIN_UTC
            })
        });
        self
    }

    /// The current expiration instant, if any.
    pub fn expiration(&self) -> Option<Timestamp> {
        self.expiration
    }

    /// Replace the item's current tags.
    ///
    /// Duplicates collapse silently; each tag is validated and an invalid
    /// tag rejects the whole set.
    pub fn set_tags<I, T>(&mut self, tags: I) -> CacheResult<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut validated = BTreeSet::new();
        for raw in tags {
            let tag = Tag::new(raw)?;
            validated.insert(tag.as_str().to_string());
        }
        self.tags = validated;
        Ok(self)
    }

    /// Tags attached by the caller this session, not yet persisted.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Tags the item had as stored, captured at fetch time.
    pub fn previous_tags(&mut self) -> CacheResult<&BTreeSet<String>> {
        self.resolve()?;
        Ok(&self.previous_tags)
    }

    /// Promote current tags to previous tags, clearing the current set.
    ///
    /// Applied to copies of deferred items handed out by the pool, so the
    /// copy looks like a genuine storage round-trip to the caller.
    pub(crate) fn rotate_tags(&mut self) {
        self.previous_tags = std::mem::take(&mut self.tags);
    }

    /// Copy this item without any pending I/O state.
    ///
    /// The pool resolves the source before copying; an unresolved source
    /// copies as a miss.
    pub(crate) fn detached_copy(&self) -> Self {
        let state = match &self.state {
            ItemState::Hit(value) => ItemState::Hit(value.clone()),
            _ => ItemState::Miss,
        };
        Self {
            key: self.key.clone(),
            state,
            previous_tags: self.previous_tags.clone(),
            tags: self.tags.clone(),
            expiration: self.expiration,
        }
    }

    /// The value a save should persist: `Null` for an item never set.
    pub(crate) fn stored_value(&mut self) -> CacheResult<CacheValue> {
        self.resolve()?;
        Ok(match &self.state {
            ItemState::Hit(value) => value.clone(),
            _ => CacheValue::Null,
        })
    }

    /// Run the pending fetch, if any. Idempotent after the first call.
    pub(crate) fn resolve(&mut self) -> CacheResult<()> {
        if !matches!(self.state, ItemState::Unresolved(_)) {
            return Ok(());
        }
        // Consume the fetch regardless of outcome; it must not run twice.
        let fetch = match std::mem::replace(&mut self.state, ItemState::Miss) {
            ItemState::Unresolved(fetch) => fetch,
            _ => unreachable!(),
        };
        match fetch()? {
            FetchOutcome::Miss => {
                self.state = ItemState::Miss;
                self.previous_tags = BTreeSet::new();
                self.expiration = None;
            }
            FetchOutcome::Hit {
                value,
                tags,
                expires_at,
            } => {
                self.state = ItemState::Hit(value);
                self.previous_tags = tags;
                self.expiration = expires_at;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CacheItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ItemState::Unresolved(_) => "Unresolved",
            ItemState::Hit(_) => "Hit",
            ItemState::Miss => "Miss",
        };
        f.debug_struct("CacheItem")
            .field("key", &self.key)
            .field("state", &state)
            .field("previous_tags", &self.previous_tags)
            .field("tags", &self.tags)
            .field("expiration", &self.expiration)
            .finish()
    }
}
