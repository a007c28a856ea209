//! Page text index cache
//!
//! Indexes are keyed by page number and validated against the page content
//! fingerprint, so a re-render with the same text reuses the index while a
//! changed text layer triggers a rebuild.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::extractor::PageTextIndex;
use super::types::PageContent;

/// Thread-safe LRU of page text indexes
pub struct PageTextCache {
    entries: Mutex<LruCache<u32, Arc<PageTextIndex>>>,
}

impl Default for PageTextCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PageTextCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get the index for a page, building it if missing or stale
    pub fn get_or_build(&self, page: &PageContent) -> Arc<PageTextIndex> {
        let fingerprint = page.fingerprint();

        if let Some(index) = self.entries.lock().get(&page.page_number) {
            if index.fingerprint() == fingerprint {
                return Arc::clone(index);
            }
            tracing::debug!(page = page.page_number, "Page text changed, rebuilding index");
        }

        // Build outside the lock; a concurrent build of the same page is harmless
        let index = Arc::new(PageTextIndex::build(page));
        self.entries.lock().put(page.page_number, Arc::clone(&index));
        index
    }

    /// Cached index for a page, regardless of freshness
    pub fn get(&self, page_number: u32) -> Option<Arc<PageTextIndex>> {
        self.entries.lock().get(&page_number).cloned()
    }

    pub fn invalidate(&self, page_number: u32) {
        self.entries.lock().pop(&page_number);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextRun;

    fn page(number: u32, text: &str) -> PageContent {
        PageContent {
            page_number: number,
            width: 600.0,
            height: 800.0,
            runs: vec![TextRun {
                text: text.to_string(),
                origin_x: 0.0,
                origin_y: 700.0,
                width: 100.0,
                height: 10.0,
            }],
        }
    }

    #[test]
    fn test_reuses_index_for_same_content() {
        let cache = PageTextCache::new(4);
        let first = cache.get_or_build(&page(1, "hello"));
        let second = cache.get_or_build(&page(1, "hello"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_rebuilds_when_text_changes() {
        let cache = PageTextCache::new(4);
        let first = cache.get_or_build(&page(1, "hello"));
        let second = cache.get_or_build(&page(1, "world"));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.normalized_text(), "world");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recent_page() {
        let cache = PageTextCache::new(2);
        cache.get_or_build(&page(1, "a"));
        cache.get_or_build(&page(2, "b"));
        cache.get_or_build(&page(3, "c"));
        assert!(cache.get(1).is_none());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_zero_capacity_still_caches_one() {
        let cache = PageTextCache::new(0);
        cache.get_or_build(&page(1, "a"));
        assert_eq!(cache.len(), 1);
        cache.invalidate(1);
        assert!(cache.is_empty());
    }
}
