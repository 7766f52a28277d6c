//! Deduplicated string storage for edge names (street names, etc.).
//!
//! Edge records store a 32-bit `name_ref` rather than a string; the
//! [`NameIndex`] maps between the two. Index `0` is reserved for the
//! empty string so an edge with no name can carry a zero-cost default.

/// A deduplicating string table keyed by a stable integer reference.
pub trait NameIndex {
    /// Returns the reference for `name`, inserting it if not already
    /// present. Calling `put("")` always returns `0`.
    fn put(&mut self, name: &str) -> i32;

    /// Looks up the string for a reference previously returned by `put`.
    ///
    /// # Panics
    ///
    /// Implementations may panic if `reference` was never returned by
    /// `put` on this index; callers only ever pass back values read
    /// from an edge record's `name_ref`.
    fn get(&self, reference: i32) -> &str;
}

/// An in-memory, append-only [`NameIndex`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryNameIndex {
    names: Vec<String>,
    lookup: std::collections::HashMap<String, i32>,
}

impl InMemoryNameIndex {
    #[must_use]
    pub fn new() -> Self {
        let mut index = Self {
            names: Vec::new(),
            lookup: std::collections::HashMap::new(),
        };
        index.put("");
        index
    }
}

impl NameIndex for InMemoryNameIndex {
    fn put(&mut self, name: &str) -> i32 {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = i32::try_from(self.names.len()).expect("name table exceeded i32::MAX entries");
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    fn get(&self, reference: i32) -> &str {
        &self.names[reference as usize]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        let mut index = InMemoryNameIndex::new();
        assert_eq!(index.put(""), 0);
        assert_eq!(index.get(0), "");
    }

    #[test]
    fn repeated_names_share_a_reference() {
        let mut index = InMemoryNameIndex::new();
        let a = index.put("Main Street");
        let b = index.put("Main Street");
        assert_eq!(a, b);
        assert_eq!(index.get(a), "Main Street");
    }

    #[test]
    fn distinct_names_get_distinct_references() {
        let mut index = InMemoryNameIndex::new();
        let a = index.put("Main Street");
        let b = index.put("Elm Street");
        assert_ne!(a, b);
    }
}
