//! Serialization codec boundary.
//!
//! The pool only requires "serialize, then deserialize, yields an equal
//! value" and must survive corrupt input: a decode failure is reported as
//! [`CodecError`] and the item read path turns it into a cache miss, never a
//! crash. The trait exists so tests can substitute a deliberately corrupting
//! codec.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tagstash_core::{CacheValue, CodecError, Timestamp};

/// Value <-> bytes codec.
pub trait Codec: Send + Sync + 'static {
    /// Serialize a value to bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a value from bytes.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }
}

/// On-disk record for a single cache item.
///
/// One serialized `ItemRecord` per item file: the value, the tags the item
/// carried at save time, and the absolute expiration instant (`None` means
/// the item never expires).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub value: CacheValue,
    pub tags: BTreeSet<String>,
    pub expires_at: Option<Timestamp>,
}
