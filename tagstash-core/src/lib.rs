//! Tagstash Core - Shared Types
//!
//! Errors, validated keys/tags, and the dynamic value model for the tagstash
//! file-backed cache. This crate contains only data types and validation -
//! the pool logic and storage adapters live in `tagstash-storage`.

pub mod error;
pub mod key;
pub mod value;

pub use error::{CacheError, CacheResult, CodecError, StorageError};
pub use key::{CacheKey, Tag, RESERVED_CHARACTERS, TAG_SEPARATOR};
pub use value::CacheValue;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
