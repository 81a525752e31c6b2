//! Tag-aware cache pool over a storage adapter.
//!
//! The pool orchestrates items, tag indices, and the storage adapter:
//! get/save/delete/clear, deferred (batched) writes, and tag invalidation.
//! The consistency rules it enforces:
//!
//! - an item's previous tag memberships are purged before its new state is
//!   written, even when the save turns out to be an expiry-triggered delete;
//! - deferred items read back as already committed on the same pool
//!   instance (a second pool over the same root sees them only after
//!   `commit`);
//! - expired items evict themselves lazily on read, including their tag
//!   memberships.
//!
//! Error posture: `InvalidArgument` always propagates. Storage and codec
//! failures on the boolean operations are logged and reported as `false`;
//! on the read path they degrade to a cache miss.
//!
//! There is no cross-pool coordination. Tag-list updates are whole-file
//! read-modify-rewrite, so concurrent pools sharing one storage root are
//! last-writer-wins.

use chrono::Utc;
use std::sync::Arc;

use tagstash_core::{CacheError, CacheKey, CacheResult, Tag};

use crate::adapter::StorageAdapter;
use crate::codec::{Codec, ItemRecord, JsonCodec};
use crate::item::{CacheItem, FetchOutcome};
use crate::tags;

/// Configuration for a cache pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Root sub-path for item and tag-index files.
    pub folder: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            folder: "cache".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a pool config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the folder items are stored under.
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }
}

/// File-backed cache pool with tag indices and deferred writes.
pub struct CachePool<S: StorageAdapter, C: Codec = JsonCodec> {
    storage: Arc<S>,
    codec: Arc<C>,
    folder: String,
    /// Pending uncommitted items, in insertion order (FIFO commit order).
    /// Overwriting a key keeps its original position.
    deferred: Vec<CacheItem>,
}

impl<S: StorageAdapter> CachePool<S> {
    /// Create a pool with the JSON codec and default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_codec(storage, JsonCodec, PoolConfig::default())
    }
}

impl<S: StorageAdapter, C: Codec> CachePool<S, C> {
    /// Create a pool with an explicit codec and configuration.
    pub fn with_codec(storage: S, codec: C, config: PoolConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            codec: Arc::new(codec),
            folder: config.folder,
            deferred: Vec::new(),
        }
    }

    /// The folder items are stored under.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Look up an item by key.
    ///
    /// A key with a pending deferred item returns a detached copy whose
    /// current tags have been rotated into previous tags, so it reads like a
    /// genuine storage round-trip. Otherwise the item is bound to a lazy
    /// fetch; storage and decode failures during that fetch degrade to a
    /// miss.
    pub fn get_item(&mut self, key: &str) -> CacheResult<CacheItem> {
        let key = CacheKey::new(key)?;
        if let Some(pending) = self.deferred.iter_mut().find(|it| it.key() == &key) {
            pending.resolve()?;
            let mut copy = pending.detached_copy();
            copy.rotate_tags();
            return Ok(copy);
        }
        Ok(self.lazy_item(key))
    }

    /// Look up several items, preserving key order.
    ///
    /// Absent keys are misses, never errors.
    pub fn get_items<'a, I>(&mut self, keys: I) -> CacheResult<Vec<CacheItem>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().map(|key| self.get_item(key)).collect()
    }

    /// Whether a live value exists for the key.
    pub fn has_item(&mut self, key: &str) -> CacheResult<bool> {
        self.get_item(key)?.is_hit()
    }

    fn lazy_item(&self, key: CacheKey) -> CacheItem {
        let storage = Arc::clone(&self.storage);
        let codec = Arc::clone(&self.codec);
        let folder = self.folder.clone();
        let fetch_key = key.clone();
        CacheItem::pending(
            key,
            Box::new(move || fetch_record(storage.as_ref(), codec.as_ref(), &folder, &fetch_key)),
        )
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Persist an item immediately.
    ///
    /// Stale tag memberships from the item's previous tags are purged before
    /// the new memberships are written. An item whose expiration is already
    /// in the past is deleted instead of written, so a save with TTL <= 0
    /// never leaves a dangling record.
    pub fn save(&mut self, item: CacheItem) -> CacheResult<bool> {
        let key = item.key().as_str().to_string();
        degrade("save", &key, self.persist(item))
    }

    fn persist(&mut self, mut item: CacheItem) -> CacheResult<bool> {
        let path = item_path(&self.folder, item.key())?;
        let key = item.key().as_str().to_string();

        let previous: Vec<String> = item.previous_tags()?.iter().cloned().collect();
        for raw in &previous {
            let tag = Tag::new(raw.clone())?;
            tags::remove_list_entry(
                self.storage.as_ref(),
                self.codec.as_ref(),
                &self.folder,
                &tag,
                &key,
            )?;
        }
        for raw in item.tags().clone() {
            let tag = Tag::new(raw)?;
            tags::append_list_entry(
                self.storage.as_ref(),
                self.codec.as_ref(),
                &self.folder,
                &tag,
                &key,
            )?;
        }

        if let Some(when) = item.expiration() {
            if when <= Utc::now() {
                self.storage.delete(&path)?;
                return Ok(true);
            }
        }

        let record = ItemRecord {
            value: item.stored_value()?,
            tags: item.tags().clone(),
            expires_at: item.expiration(),
        };
        let bytes = self.codec.encode(&record)?;
        self.storage.write(&path, &bytes)?;
        Ok(true)
    }

    /// Queue an item for the next commit without touching storage.
    ///
    /// A later deferred item for the same key replaces the earlier one in
    /// place, keeping its original commit position.
    pub fn save_deferred(&mut self, item: CacheItem) {
        if let Some(slot) = self.deferred.iter_mut().find(|it| it.key() == item.key()) {
            *slot = item;
        } else {
            self.deferred.push(item);
        }
    }

    /// Persist every deferred item in insertion order.
    ///
    /// The deferred queue is cleared unconditionally; partial failures are
    /// not retried later. Returns `true` only if every save succeeded.
    pub fn commit(&mut self) -> CacheResult<bool> {
        let queue = std::mem::take(&mut self.deferred);
        let mut all_saved = true;
        for item in queue {
            if !self.save(item)? {
                all_saved = false;
            }
        }
        Ok(all_saved)
    }

    /// Number of items waiting for a commit.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Delete an item. Deleting an absent key succeeds.
    pub fn delete_item(&mut self, key: &str) -> CacheResult<bool> {
        self.delete_items([key])
    }

    /// Delete several items, reporting `true` only if all deletions
    /// succeeded.
    pub fn delete_items<'a, I>(&mut self, keys: I) -> CacheResult<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all_deleted = true;
        for raw in keys {
            let key = CacheKey::new(raw)?;
            self.deferred.retain(|it| it.key() != &key);
            // Commit first, so tag side effects of other deferred items are
            // already applied before this deletion's tag cleanup runs.
            if !self.commit()? {
                tracing::warn!(key = raw, "commit before delete reported failures");
            }
            if !degrade("delete", raw, self.remove_backing(&key))? {
                all_deleted = false;
            }
        }
        Ok(all_deleted)
    }

    fn remove_backing(&mut self, key: &CacheKey) -> CacheResult<bool> {
        // Discover the stored tags through a normal fetch; an expired record
        // purges its own memberships during the fetch.
        let mut item = self.lazy_item(key.clone());
        let previous: Vec<String> = item.previous_tags()?.iter().cloned().collect();
        for raw in previous {
            let tag = Tag::new(raw)?;
            tags::remove_list_entry(
                self.storage.as_ref(),
                self.codec.as_ref(),
                &self.folder,
                &tag,
                key.as_str(),
            )?;
        }
        let path = item_path(&self.folder, key)?;
        self.storage.delete(&path)?;
        Ok(true)
    }

    /// Drop all deferred items without committing them and wipe the cache
    /// folder.
    ///
    /// Tag-index files live under the same folder, so the recursive delete
    /// discards them as well; no separate tag cleanup is needed.
    pub fn clear(&mut self) -> CacheResult<bool> {
        self.deferred.clear();
        let folder = self.folder.clone();
        degrade("clear", &folder, self.wipe_folder())
    }

    fn wipe_folder(&mut self) -> CacheResult<bool> {
        self.storage.delete_directory(&self.folder)?;
        self.storage.create_directory(&self.folder)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Tag invalidation
    // ------------------------------------------------------------------

    /// Delete every item carrying the tag, then the tag's own index record.
    pub fn invalidate_tag(&mut self, tag: &str) -> CacheResult<bool> {
        self.invalidate_tags([tag])
    }

    /// Delete every item carrying any of the tags.
    ///
    /// Index records are removed only after the mass delete fully succeeded;
    /// on partial failure they are left intact so a retry can rediscover the
    /// remaining members, and `false` is returned.
    pub fn invalidate_tags<'a, I>(&mut self, tags: I) -> CacheResult<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parsed = Vec::new();
        for raw in tags {
            parsed.push(Tag::new(raw)?);
        }
        let label = parsed
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");
        degrade("invalidate_tags", &label, self.invalidate_parsed(&parsed))
    }

    fn invalidate_parsed(&mut self, tags: &[Tag]) -> CacheResult<bool> {
        let mut keys: Vec<String> = Vec::new();
        for tag in tags {
            keys.extend(tags::read_list(
                self.storage.as_ref(),
                self.codec.as_ref(),
                &self.folder,
                tag,
            )?);
        }
        // Duplicates are fine; deletion is idempotent.
        if !self.delete_items(keys.iter().map(|k| k.as_str()))? {
            return Ok(false);
        }
        for tag in tags {
            tags::drop_list(self.storage.as_ref(), &self.folder, tag)?;
        }
        Ok(true)
    }
}

impl<S: StorageAdapter, C: Codec> Drop for CachePool<S, C> {
    /// Implicit commit on teardown. Failures are logged, never panicked.
    fn drop(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        match self.commit() {
            Ok(true) => {}
            Ok(false) => tracing::warn!("implicit commit on drop reported failures"),
            Err(err) => tracing::warn!(error = %err, "implicit commit on drop failed"),
        }
    }
}

/// Backing path for an item's record. Stage-two key validation happens here.
fn item_path(folder: &str, key: &CacheKey) -> CacheResult<String> {
    Ok(format!("{folder}/{}", key.file_name()?))
}

/// The lazy fetch behind a non-deferred item.
///
/// Read and decode failures are a miss, not an error; an expired record is
/// purged from its tag lists, deleted, and reported as a miss. Only
/// `InvalidArgument` from path resolution propagates.
fn fetch_record<S: StorageAdapter, C: Codec>(
    storage: &S,
    codec: &C,
    folder: &str,
    key: &CacheKey,
) -> CacheResult<FetchOutcome> {
    let path = item_path(folder, key)?;

    let bytes = match storage.read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            if !err.is_not_found() {
                tracing::warn!(key = %key, error = %err, "cache read failed; treated as miss");
            }
            return Ok(FetchOutcome::Miss);
        }
    };

    let record: ItemRecord = match codec.decode(&bytes) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "corrupt cache record; treated as miss");
            return Ok(FetchOutcome::Miss);
        }
    };

    if let Some(when) = record.expires_at {
        if when <= Utc::now() {
            for raw in &record.tags {
                let purged = Tag::new(raw.clone()).and_then(|tag| {
                    tags::remove_list_entry(storage, codec, folder, &tag, key.as_str())
                });
                if let Err(err) = purged {
                    tracing::warn!(key = %key, tag = raw, error = %err, "failed to purge expired tag membership");
                }
            }
            if let Err(err) = storage.delete(&path) {
                tracing::warn!(key = %key, error = %err, "failed to evict expired record");
            }
            return Ok(FetchOutcome::Miss);
        }
    }

    Ok(FetchOutcome::Hit {
        value: record.value,
        tags: record.tags,
        expires_at: record.expires_at,
    })
}

/// Convert storage/codec failures into a logged `false`; `InvalidArgument`
/// re-raises.
fn degrade(op: &str, key: &str, result: CacheResult<bool>) -> CacheResult<bool> {
    match result {
        Err(err @ CacheError::InvalidArgument { .. }) => Err(err),
        Err(err) => {
            tracing::warn!(op, key, error = %err, "cache operation failed");
            Ok(false)
        }
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FilesystemAdapter;
    use tagstash_core::CacheValue;
    use tempfile::TempDir;

    fn create_pool() -> (CachePool<FilesystemAdapter>, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let adapter =
            FilesystemAdapter::new(temp_dir.path()).expect("adapter creation should succeed");
        (CachePool::new(adapter), temp_dir)
    }

    fn adapter_for(temp_dir: &TempDir) -> FilesystemAdapter {
        FilesystemAdapter::new(temp_dir.path()).expect("adapter creation should succeed")
    }

    #[test]
    fn test_save_then_get_roundtrip() {
        let (mut pool, _temp_dir) = create_pool();

        let mut item = pool.get_item("greeting").expect("get_item should succeed");
        assert!(!item.is_hit().expect("is_hit should succeed"));
        item.set("hello");
        assert!(pool.save(item).expect("save should succeed"));

        let mut back = pool.get_item("greeting").expect("get_item should succeed");
        assert!(back.is_hit().expect("is_hit should succeed"));
        assert_eq!(
            back.value().expect("value should succeed"),
            Some(&CacheValue::Text("hello".into()))
        );
    }

    #[test]
    fn test_saved_tags_become_previous_tags_on_refetch() {
        let (mut pool, _temp_dir) = create_pool();

        let mut item = pool.get_item("k").expect("get_item should succeed");
        item.set("v");
        item.set_tags(["t1", "t2"]).expect("tags should validate");
        assert!(pool.save(item).expect("save should succeed"));

        let mut back = pool.get_item("k").expect("get_item should succeed");
        let previous: Vec<_> = back
            .previous_tags()
            .expect("previous_tags should succeed")
            .iter()
            .cloned()
            .collect();
        assert_eq!(previous, vec!["t1".to_string(), "t2".to_string()]);
        assert!(back.tags().is_empty());
    }

    #[test]
    fn test_invalid_key_raises() {
        let (mut pool, _temp_dir) = create_pool();
        assert!(matches!(
            pool.get_item("bad/key"),
            Err(CacheError::InvalidArgument { .. })
        ));
        assert!(matches!(
            pool.delete_item("bad@key"),
            Err(CacheError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_stage_two_key_fails_on_save_not_lookup_construction() {
        let (mut pool, _temp_dir) = create_pool();
        // Passes stage one, fails path resolution.
        let mut item = pool.get_item("köln").expect("stage one should pass");
        item.set("v");
        assert!(matches!(
            pool.save(item),
            Err(CacheError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_save_with_past_expiration_leaves_no_record() {
        let (mut pool, temp_dir) = create_pool();

        let mut item = pool.get_item("short").expect("get_item should succeed");
        item.set("v");
        item.expires_after(Some(chrono::Duration::seconds(-1)));
        assert!(pool.save(item).expect("save should succeed"));

        assert!(!pool.has_item("short").expect("has_item should succeed"));
        let adapter = adapter_for(&temp_dir);
        assert!(!adapter
            .file_exists("cache/short")
            .expect("file_exists should succeed"));
    }

    #[test]
    fn test_expired_record_is_lazily_evicted_on_read() {
        let (mut pool, temp_dir) = create_pool();
        let adapter = adapter_for(&temp_dir);
        let codec = JsonCodec;

        // Plant an already-expired record with a tag membership, bypassing
        // save's own expiry shortcut.
        let record = ItemRecord {
            value: CacheValue::Int(1),
            tags: ["stale".to_string()].into_iter().collect(),
            expires_at: Some(Utc::now() - chrono::Duration::seconds(5)),
        };
        adapter
            .write("cache/old", &codec.encode(&record).expect("encode should succeed"))
            .expect("write should succeed");
        let stale = Tag::new("stale").expect("tag should validate");
        tags::append_list_entry(&adapter, &codec, "cache", &stale, "old")
            .expect("append should succeed");

        assert!(!pool.has_item("old").expect("has_item should succeed"));
        // Eviction removed both the record and the tag membership.
        assert!(!adapter
            .file_exists("cache/old")
            .expect("file_exists should succeed"));
        let list =
            tags::read_list(&adapter, &codec, "cache", &stale).expect("read_list should succeed");
        assert!(list.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let (mut pool, temp_dir) = create_pool();
        let adapter = adapter_for(&temp_dir);
        adapter
            .write("cache/broken", b"\x00\x01 definitely not a record")
            .expect("write should succeed");

        assert!(!pool.has_item("broken").expect("has_item should succeed"));
    }

    #[test]
    fn test_deferred_item_visible_before_commit() {
        let (mut pool, temp_dir) = create_pool();

        let mut item = pool.get_item("queued").expect("get_item should succeed");
        item.set("v");
        item.set_tags(["t"]).expect("tags should validate");
        pool.save_deferred(item);

        assert!(pool.has_item("queued").expect("has_item should succeed"));

        // The copy handed out presents the deferred tags as previous state.
        let mut copy = pool.get_item("queued").expect("get_item should succeed");
        assert!(copy.tags().is_empty());
        let previous: Vec<_> = copy
            .previous_tags()
            .expect("previous_tags should succeed")
            .iter()
            .cloned()
            .collect();
        assert_eq!(previous, vec!["t".to_string()]);

        // Nothing on disk yet.
        let adapter = adapter_for(&temp_dir);
        assert!(!adapter
            .file_exists("cache/queued")
            .expect("file_exists should succeed"));

        assert!(pool.commit().expect("commit should succeed"));
        assert_eq!(pool.deferred_len(), 0);
        assert!(adapter
            .file_exists("cache/queued")
            .expect("file_exists should succeed"));
    }

    #[test]
    fn test_mutating_the_deferred_copy_does_not_touch_the_queue() {
        let (mut pool, _temp_dir) = create_pool();

        let mut item = pool.get_item("k").expect("get_item should succeed");
        item.set("original");
        pool.save_deferred(item);

        let mut copy = pool.get_item("k").expect("get_item should succeed");
        copy.set("mutated");

        assert!(pool.commit().expect("commit should succeed"));
        let mut back = pool.get_item("k").expect("get_item should succeed");
        assert_eq!(
            back.value().expect("value should succeed"),
            Some(&CacheValue::Text("original".into()))
        );
    }

    #[test]
    fn test_save_deferred_overwrites_by_key_keeping_position() {
        let (mut pool, _temp_dir) = create_pool();

        for (key, value) in [("a", "1"), ("b", "2"), ("a", "3")] {
            let mut item = pool.get_item(key).expect("get_item should succeed");
            item.set(value);
            pool.save_deferred(item);
        }
        assert_eq!(pool.deferred_len(), 2);

        let mut a = pool.get_item("a").expect("get_item should succeed");
        assert_eq!(
            a.value().expect("value should succeed"),
            Some(&CacheValue::Text("3".into()))
        );
    }

    #[test]
    fn test_clear_discards_deferred_and_wipes_folder() {
        let (mut pool, _temp_dir) = create_pool();

        let mut saved = pool.get_item("saved").expect("get_item should succeed");
        saved.set("v");
        assert!(pool.save(saved).expect("save should succeed"));

        let mut queued = pool.get_item("queued").expect("get_item should succeed");
        queued.set("v");
        pool.save_deferred(queued);

        assert!(pool.clear().expect("clear should succeed"));
        assert_eq!(pool.deferred_len(), 0);
        assert!(!pool.has_item("saved").expect("has_item should succeed"));

        // The deferred item was discarded, not committed.
        assert!(pool.commit().expect("commit should succeed"));
        assert!(!pool.has_item("queued").expect("has_item should succeed"));
    }

    #[test]
    fn test_delete_absent_key_succeeds() {
        let (mut pool, _temp_dir) = create_pool();
        assert!(pool.delete_item("nothing").expect("delete should succeed"));
    }

    #[test]
    fn test_delete_drops_deferred_entry() {
        let (mut pool, _temp_dir) = create_pool();

        let mut item = pool.get_item("k").expect("get_item should succeed");
        item.set("v");
        pool.save_deferred(item);

        assert!(pool.delete_item("k").expect("delete should succeed"));
        assert!(!pool.has_item("k").expect("has_item should succeed"));
        assert_eq!(pool.deferred_len(), 0);
    }

    #[test]
    fn test_delete_purges_tag_membership() {
        let (mut pool, temp_dir) = create_pool();

        let mut item = pool.get_item("k").expect("get_item should succeed");
        item.set("v");
        item.set_tags(["t"]).expect("tags should validate");
        assert!(pool.save(item).expect("save should succeed"));

        assert!(pool.delete_item("k").expect("delete should succeed"));

        let adapter = adapter_for(&temp_dir);
        let list = tags::read_list(
            &adapter,
            &JsonCodec,
            "cache",
            &Tag::new("t").expect("tag should validate"),
        )
        .expect("read_list should succeed");
        assert!(list.is_empty());
    }

    #[test]
    fn test_get_items_preserves_order() {
        let (mut pool, _temp_dir) = create_pool();

        let mut item = pool.get_item("present").expect("get_item should succeed");
        item.set("v");
        assert!(pool.save(item).expect("save should succeed"));

        let items = pool
            .get_items(["absent", "present"])
            .expect("get_items should succeed");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key().as_str(), "absent");
        assert_eq!(items[1].key().as_str(), "present");
    }

    #[test]
    fn test_overwrite_replaces_stale_tag_membership() {
        let (mut pool, temp_dir) = create_pool();

        let mut item = pool.get_item("k").expect("get_item should succeed");
        item.set("v1");
        item.set_tags(["t1"]).expect("tags should validate");
        assert!(pool.save(item).expect("save should succeed"));

        // Refetch and resolve so previous tags are the stored ones, then
        // retag. A set() before resolving would cancel the fetch and leave
        // the stored tags unknown.
        let mut item = pool.get_item("k").expect("get_item should succeed");
        assert!(item.is_hit().expect("is_hit should succeed"));
        item.set("v2");
        item.set_tags(["t2"]).expect("tags should validate");
        assert!(pool.save(item).expect("save should succeed"));

        let adapter = adapter_for(&temp_dir);
        let codec = JsonCodec;
        let t1 = tags::read_list(
            &adapter,
            &codec,
            "cache",
            &Tag::new("t1").expect("tag should validate"),
        )
        .expect("read_list should succeed");
        assert!(t1.is_empty(), "old membership must be purged on overwrite");
        let t2 = tags::read_list(
            &adapter,
            &codec,
            "cache",
            &Tag::new("t2").expect("tag should validate"),
        )
        .expect("read_list should succeed");
        assert_eq!(t2, vec!["k"]);
    }
}
