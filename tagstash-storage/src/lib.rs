//! Tagstash Storage - Adapters and the Cache Pool
//!
//! File-backed key/value cache with secondary tag indices and time-based
//! expiration. The [`CachePool`] orchestrates [`CacheItem`], the tag-index
//! lists, and a [`StorageAdapter`]:
//!
//! ```no_run
//! use tagstash_storage::{CachePool, FilesystemAdapter};
//!
//! # fn main() -> tagstash_core::CacheResult<()> {
//! let adapter = FilesystemAdapter::new("/var/cache/app").expect("cache root");
//! let mut pool = CachePool::new(adapter);
//!
//! let mut item = pool.get_item("user.42")?;
//! if !item.is_hit()? {
//!     item.set("payload");
//!     item.set_tags(["users"])?;
//!     item.expires_after(Some(chrono::Duration::minutes(10)));
//!     pool.save(item)?;
//! }
//!
//! // Later: drop every cached entry tagged "users" at once.
//! pool.invalidate_tag("users")?;
//! # Ok(())
//! # }
//! ```
//!
//! Single-process, synchronous. Concurrent pools sharing one storage root
//! are not coordinated; tag-list updates are last-writer-wins.

pub mod adapter;
pub mod codec;
pub mod filesystem;
pub mod item;
pub mod pool;
mod tags;

pub use adapter::StorageAdapter;
pub use codec::{Codec, ItemRecord, JsonCodec};
pub use filesystem::FilesystemAdapter;
pub use item::CacheItem;
pub use pool::{CachePool, PoolConfig};
