//! Tag-index list primitives.
//!
//! Each tag owns one list file under the pool folder, addressed by the
//! synthesized key `tag!<name>`, holding the keys of every item stored with
//! that tag. The backing store only supports whole-value put/get, so every
//! mutation is a read-modify-rewrite of the full list. Across pool instances
//! sharing one root that is last-writer-wins; concurrent updates can be
//! lost. Accepted limitation, documented on the pool.
//!
//! These are free functions over (adapter, codec, folder) rather than pool
//! methods so the item fetch closure can purge expired memberships without
//! borrowing the pool.

use tagstash_core::{CacheResult, Tag};

use crate::adapter::StorageAdapter;
use crate::codec::Codec;

/// Backing path for a tag's index list.
pub(crate) fn list_path(folder: &str, tag: &Tag) -> CacheResult<String> {
    let index_key = tag.index_key();
    let file = index_key.file_name()?;
    Ok(format!("{folder}/{file}"))
}

/// Read a tag's index list, creating it empty on first reference.
pub(crate) fn read_list<S: StorageAdapter, C: Codec>(
    storage: &S,
    codec: &C,
    folder: &str,
    tag: &Tag,
) -> CacheResult<Vec<String>> {
    let path = list_path(folder, tag)?;
    if !storage.file_exists(&path)? {
        let empty = codec.encode(&Vec::<String>::new())?;
        storage.write(&path, &empty)?;
    }
    let bytes = storage.read(&path)?;
    Ok(codec.decode(&bytes)?)
}

/// Append an item key to a tag's index list.
pub(crate) fn append_list_entry<S: StorageAdapter, C: Codec>(
    storage: &S,
    codec: &C,
    folder: &str,
    tag: &Tag,
    key: &str,
) -> CacheResult<()> {
    let mut list = read_list(storage, codec, folder, tag)?;
    list.push(key.to_string());
    let path = list_path(folder, tag)?;
    storage.write(&path, &codec.encode(&list)?)?;
    Ok(())
}

/// Remove every occurrence of an item key from a tag's index list.
///
/// Tolerates an absent list and duplicate entries.
pub(crate) fn remove_list_entry<S: StorageAdapter, C: Codec>(
    storage: &S,
    codec: &C,
    folder: &str,
    tag: &Tag,
    key: &str,
) -> CacheResult<()> {
    let mut list = read_list(storage, codec, folder, tag)?;
    list.retain(|entry| entry != key);
    let path = list_path(folder, tag)?;
    storage.write(&path, &codec.encode(&list)?)?;
    Ok(())
}

/// Delete a tag's index list outright.
pub(crate) fn drop_list<S: StorageAdapter>(storage: &S, folder: &str, tag: &Tag) -> CacheResult<()> {
    let path = list_path(folder, tag)?;
    storage.delete(&path)?;
    Ok(())
}
