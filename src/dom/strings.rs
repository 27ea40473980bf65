//! String Interning Pool
//!
//! Deduplicated storage for element names, attribute names, namespace
//! prefixes and URIs. Names repeat heavily in real documents, so nodes
//! carry a `u32` id instead of an owned string.
//!
//! Uses hash-based lookup to avoid storing duplicate string data.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// String interning pool
///
/// Memory layout:
/// - `entries`: (offset, len) into `data` for each interned string ID
/// - `data`: one buffer holding every distinct string
/// - `hash_index`: hash -> list of IDs (handles rare collisions)
///
/// ID 0 is always the empty string.
#[derive(Debug, Clone)]
pub struct StringPool {
    entries: Vec<(u32, u32)>,
    data: String,
    hash_index: HashMap<u64, Vec<u32>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(64),
            data: String::with_capacity(1024),
            hash_index: HashMap::new(),
        };
        pool.entries.push((0, 0));
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// ID of an already interned string, without interning it
    pub fn lookup(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(0);
        }
        self.hash_index
            .get(&Self::compute_hash(s))?
            .iter()
            .copied()
            .find(|&id| self.get_str(id) == s)
    }

    /// Intern a string, returning its ID
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.lookup(s) {
            return id;
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.hash_index
            .entry(Self::compute_hash(s))
            .or_default()
            .push(id);
        id
    }

    /// Get a string by ID. Unknown IDs resolve to the empty string.
    #[inline]
    pub fn get_str(&self, id: u32) -> &str {
        match self.entries.get(id as usize) {
            Some(&(offset, len)) => {
                let start = offset as usize;
                self.data.get(start..start + len as usize).unwrap_or("")
            }
            None => "",
        }
    }

    /// Number of distinct strings, the reserved empty string included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern() {
        let mut pool = StringPool::new();
        let id = pool.intern("hello");
        assert!(id > 0);
        assert_eq!(pool.get_str(id), "hello");
    }

    #[test]
    fn test_intern_duplicate() {
        let mut pool = StringPool::new();
        let id1 = pool.intern("hello");
        let id2 = pool.intern("hello");
        assert_eq!(id1, id2);
        assert_ne!(id1, pool.intern("world"));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_empty_string() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), 0);
        assert_eq!(pool.get_str(0), "");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let mut pool = StringPool::new();
        assert_eq!(pool.lookup("x"), None);
        let id = pool.intern("x");
        assert_eq!(pool.lookup("x"), Some(id));
        assert_eq!(pool.get_str(999), "");
    }
}
