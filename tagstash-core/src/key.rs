//! Validated cache keys and tags.
//!
//! Validation is two-stage. Stage one runs at construction and rejects the
//! reserved characters `{ } ( ) / \ @ :` and the empty string; both keys and
//! tags pass through it. Stage two runs when a key is mapped to a backing
//! file name and restricts it to `[a-zA-Z0-9_.! ]+`. A key can pass stage one
//! and still fail stage two, in which case the failure is raised at
//! path-resolution time, not at construction.
//!
//! The private field makes an unvalidated `CacheKey` unconstructible: every
//! key in circulation has passed stage one.

use crate::error::{CacheError, CacheResult};
use std::fmt;

/// Characters that may never appear in a key or tag.
pub const RESERVED_CHARACTERS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

/// Separator between the `tag` prefix and the tag name in a tag-index key.
///
/// `!` is deliberately inside the stage-two character class so that
/// synthesized tag-index keys resolve to file names like any other key.
/// The flip side is that item keys and tag-index keys share one namespace:
/// a caller-chosen key of the form `tag!<name>` passes both validation
/// stages and maps to the same backing file as tag `<name>`'s index list.
/// Saving under such a key overwrites that index. Callers who use tags
/// must not use `tag!`-prefixed item keys.
pub const TAG_SEPARATOR: char = '!';

/// Stage-one validation shared by keys and tags.
fn check_reserved(what: &str, raw: &str) -> CacheResult<()> {
    if raw.is_empty() {
        return Err(CacheError::invalid_argument(format!("{what} must not be empty")));
    }
    if let Some(c) = raw.chars().find(|c| RESERVED_CHARACTERS.contains(c)) {
        return Err(CacheError::invalid_argument(format!(
            "{what} {raw:?} contains reserved character {c:?}"
        )));
    }
    Ok(())
}

/// A cache item key that has passed stage-one validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validate and wrap a raw key (stage one).
    pub fn new(raw: impl Into<String>) -> CacheResult<Self> {
        let raw = raw.into();
        check_reserved("key", &raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map this key to a backing file name (stage two).
    ///
    /// Fails with `InvalidArgument` for keys outside `[a-zA-Z0-9_.! ]+`.
    pub fn file_name(&self) -> CacheResult<&str> {
        let valid = self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '!' | ' '));
        if valid {
            Ok(&self.0)
        } else {
            Err(CacheError::invalid_argument(format!(
                "key {:?} cannot be mapped to a file path; allowed characters are [a-zA-Z0-9_.! ]",
                self.0
            )))
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tag name that has passed stage-one validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Validate and wrap a raw tag name.
    pub fn new(raw: impl Into<String>) -> CacheResult<Self> {
        let raw = raw.into();
        check_reserved("tag", &raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthesize the key under which this tag's index list is stored.
    ///
    /// Index keys live in the same namespace as item keys (see
    /// [`TAG_SEPARATOR`]): a caller-chosen item key equal to
    /// `tag!<name>` addresses the same backing file as this index.
    pub fn index_key(&self) -> CacheKey {
        // "tag" + SEP + name passes stage one by construction: neither the
        // prefix nor a validated tag name contains reserved characters.
        CacheKey(format!("tag{TAG_SEPARATOR}{}", self.0))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
