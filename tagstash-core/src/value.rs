//! Dynamic value model for cached payloads.
//!
//! The pool stores heterogeneous payloads in one namespace, so the value type
//! is a closed enum rather than a generic parameter. A closed enum also keeps
//! binary payloads exact: `Bytes` round-trips all 256 byte values through the
//! codec, which an untyped JSON value cannot guarantee.
//!
//! `Null` is a legal stored value, distinct from "absent": a lookup can be a
//! hit whose value is `Null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cacheable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
}

impl CacheValue {
    /// Returns true if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the inner string, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the inner bytes, if this is a `Bytes` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The inner integer, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(v: Vec<CacheValue>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(v: BTreeMap<String, CacheValue>) -> Self {
        Self::Map(v)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy generating arbitrary nested cache values.
    fn value_strategy() -> impl Strategy<Value = CacheValue> {
        let leaf = prop_oneof![
            Just(CacheValue::Null),
            any::<bool>().prop_map(CacheValue::Bool),
            any::<i64>().prop_map(CacheValue::Int),
            // Finite floats only: NaN breaks equality, infinities break JSON.
            (-1.0e12f64..1.0e12).prop_map(CacheValue::Float),
            ".{0,16}".prop_map(CacheValue::Text),
            proptest::collection::vec(any::<u8>(), 0..32).prop_map(CacheValue::Bytes),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(CacheValue::List),
                proptest::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(CacheValue::Map),
            ]
        })
    }

    proptest! {
        /// Property: serialize-then-deserialize yields an equal value.
        #[test]
        fn prop_serde_roundtrip(value in value_strategy()) {
            let bytes = serde_json::to_vec(&value).expect("encode should succeed");
            let back: CacheValue = serde_json::from_slice(&bytes).expect("decode should succeed");
            prop_assert_eq!(back, value);
        }
    }
}
