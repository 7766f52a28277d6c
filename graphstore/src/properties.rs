//! Metadata key/value store carried alongside a graph, used to record
//! versioning information so `load_existing` can refuse to open storage
//! written by an incompatible build.

use crate::error::{GraphStoreError, Result};
use std::collections::BTreeMap;

/// The version key written by [`Properties::put_current_versions`] and
/// checked by [`Properties::check_versions`].
pub const VERSION_KEY: &str = "graphstore.version";

/// The format version this build of the crate writes and expects.
///
/// Bump this whenever a change to the on-disk record layout would make
/// an older store unreadable.
pub const CURRENT_VERSION: &str = "1";

/// A small string-keyed metadata store.
pub trait Properties {
    /// Stores `value` under `key`, overwriting any previous value.
    fn put(&mut self, key: &str, value: &str);

    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<&str>;

    /// Records the current build's format version under [`VERSION_KEY`].
    fn put_current_versions(&mut self) {
        self.put(VERSION_KEY, CURRENT_VERSION);
    }

    /// Checks the stored version against [`CURRENT_VERSION`].
    ///
    /// When `strict` is `true`, a missing or mismatched version is an
    /// error. When `false`, a missing key is tolerated (for storage
    /// written before versioning existed) but a mismatched one is still
    /// an error: silently reinterpreting a known-incompatible layout is
    /// worse than refusing to open it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStoreError::Corrupt`] if the stored version does
    /// not match, or (in strict mode) is absent.
    fn check_versions(&self, strict: bool) -> Result<()> {
        match self.get(VERSION_KEY) {
            Some(found) if found == CURRENT_VERSION => Ok(()),
            Some(found) => Err(GraphStoreError::Corrupt(format!(
                "stored format version {found} does not match {CURRENT_VERSION}"
            ))),
            None if strict => Err(GraphStoreError::Corrupt(format!(
                "missing {VERSION_KEY}; cannot verify compatibility"
            ))),
            None => Ok(()),
        }
    }
}

/// An in-memory [`Properties`] store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProperties {
    entries: BTreeMap<String, String>,
}

impl InMemoryProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Properties for InMemoryProperties {
    fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_store_passes_non_strict_check() {
        let props = InMemoryProperties::new();
        assert!(props.check_versions(false).is_ok());
        assert!(props.check_versions(true).is_err());
    }

    #[test]
    fn matching_version_passes_both_checks() {
        let mut props = InMemoryProperties::new();
        props.put_current_versions();
        assert!(props.check_versions(false).is_ok());
        assert!(props.check_versions(true).is_ok());
    }

    #[test]
    fn mismatched_version_always_fails() {
        let mut props = InMemoryProperties::new();
        props.put(VERSION_KEY, "0");
        assert!(props.check_versions(false).is_err());
        assert!(props.check_versions(true).is_err());
    }
}
