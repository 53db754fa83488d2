//! Last full result set per (kind, root)
//!
//! Sessions read from here to serve something immediately while a fresh
//! scan runs; the scan replaces the entry wholesale when it finishes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::models::{KindFilter, RankedItem};

/// `<kind>::<root>`
pub fn cache_key(filter: KindFilter, root: &Path) -> String {
    format!("{}::{}", filter, root.display())
}

/// Injected cache of ranked result lists
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<RankedItem>>;

    /// Replace the entry for `key`
    fn set(&self, key: &str, items: Vec<RankedItem>);

    fn invalidate(&self, key: &str);

    fn clear(&self);
}

/// Process-lifetime in-memory cache
#[derive(Debug, Default)]
pub struct MemoryResultCache {
    entries: RwLock<HashMap<String, Vec<RankedItem>>>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&self, key: &str) -> Option<Vec<RankedItem>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let hit = entries.get(key).cloned();
        log::debug!(
            "Result cache {}: {}",
            if hit.is_some() { "HIT" } else { "MISS" },
            key
        );
        hit
    }

    fn set(&self, key: &str, items: Vec<RankedItem>) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        log::debug!("Result cache SET: {} ({} items)", key, items.len());
        entries.insert(key.to_string(), items);
    }

    fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(key);
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SymbolKind, SymbolOccurrence};

    fn item(name: &str) -> RankedItem {
        RankedItem::new(
            SymbolOccurrence {
                name: name.to_string(),
                path: "a.ts".to_string(),
                line: 1,
                start_col: 0,
                end_col: name.len(),
                kind: SymbolKind::Class,
            },
            0.0,
        )
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            cache_key(KindFilter::Only(SymbolKind::SchemaDeclaration), Path::new("/repo")),
            "schema-declaration::/repo"
        );
        assert_eq!(cache_key(KindFilter::All, Path::new("/repo")), "all::/repo");
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let cache = MemoryResultCache::new();
        assert!(cache.get("k").is_none());

        cache.set("k", vec![item("A"), item("B")]);
        cache.set("k", vec![item("C")]);

        let items = cache.get("k").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].occurrence.name, "C");
    }

    #[test]
    fn test_keys_are_isolated_and_invalidate() {
        let cache = MemoryResultCache::new();
        cache.set("class::/a", vec![item("A")]);
        cache.set("class::/b", vec![item("B")]);
        assert_eq!(cache.len(), 2);

        cache.invalidate("class::/a");
        assert!(cache.get("class::/a").is_none());
        assert!(cache.get("class::/b").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
