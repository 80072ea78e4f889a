//! Component identifier syntax and unique id generation

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Prefix used for generated ids
pub const UNIQUE_ID_PREFIX: &str = "j_id";

/// Check a local component id against the identifier syntax.
///
/// The first character must be a letter or underscore, every following
/// character a letter, digit, hyphen or underscore. An empty id is invalid.
pub fn validate_id(id: &str) -> Result<()> {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return Err(Error::InvalidIdentifier(id.to_string())),
    }
    if chars.all(is_id_char) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(id.to_string()))
    }
}

/// Whether `c` may appear after the first character of an id
#[inline]
pub fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Thread-safe generator of ids unique within one generator
pub struct UniqueIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl UniqueIdGenerator {
    /// Create a generator using the default prefix
    pub fn new() -> Self {
        Self::with_prefix(UNIQUE_ID_PREFIX)
    }

    /// Create a generator using a custom prefix.
    ///
    /// The prefix must itself be a valid id so every generated id is.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Generate the next unique id
    pub fn next_id(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, index)
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for UniqueIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UniqueIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueIdGenerator")
            .field("prefix", &self.prefix)
            .field("issued", &self.issued())
            .finish()
    }
}
