use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;

use super::error::{ExpressionError, ExpressionResult};

/// Default number of entries kept before a cache is flushed.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Small string-keyed cache. When full, the whole map is cleared.
#[derive(Debug)]
pub struct BoundedCache<V> {
    entries: RwLock<HashMap<String, V>>,
    capacity: usize,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        BoundedCache {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached value for `key`, building it with `build` on a miss.
    pub fn get_or_try_insert<F>(&self, key: &str, build: F) -> ExpressionResult<V>
    where
        F: FnOnce() -> ExpressionResult<V>,
    {
        if let Some(value) = self.entries.read().get(key) {
            return Ok(value.clone());
        }

        let value = build()?;

        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Compiled patterns anchored for whole-string matching.
#[derive(Debug)]
pub struct RegexCache {
    patterns: BoundedCache<Regex>,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        RegexCache {
            patterns: BoundedCache::new(capacity),
        }
    }

    /// True when `pattern` matches all of `text`.
    pub fn full_match(&self, pattern: &str, text: &str) -> ExpressionResult<bool> {
        let regex = self.patterns.get_or_try_insert(pattern, || {
            let invalid = |e: regex::Error| ExpressionError::InvalidRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            };
            // The bare pattern must compile on its own so that unbalanced
            // groups cannot escape the anchoring wrapper.
            Regex::new(pattern).map_err(invalid)?;
            Regex::new(&format!("^(?:{})$", pattern)).map_err(invalid)
        })?;
        Ok(regex.is_match(text))
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        RegexCache::new(DEFAULT_CAPACITY)
    }
}
