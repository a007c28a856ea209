//! Re-anchoring
//!
//! Annotations produced by auto-annotation jobs, or whose text carries a
//! trailing citation parenthetical, may have approximate geometry. They are
//! relocated once per lifetime by searching their text in the page's
//! normalized text and picking the occurrence closest to the stored rect.
//!
//! Batches run per page. Pages are independent; annotations of one page are
//! processed sequentially against one shared index.

mod matcher;

use std::sync::Arc;

use futures::future::join_all;

use crate::annotations::AnnotationStore;
use crate::text::{PageContent, PageTextCache};

pub use matcher::{Candidate, ReanchorMatcher, ReanchorOutcome, ReanchorReport};

/// Runs page batches against an annotation store
#[derive(Clone)]
pub struct Reanchorer {
    matcher: Arc<ReanchorMatcher>,
    cache: Arc<PageTextCache>,
}

impl Reanchorer {
    pub fn new(matcher: ReanchorMatcher, cache: Arc<PageTextCache>) -> Self {
        Self {
            matcher: Arc::new(matcher),
            cache,
        }
    }

    pub fn matcher(&self) -> &ReanchorMatcher {
        &self.matcher
    }

    /// Re-anchor the eligible annotations of a rendered page
    ///
    /// The page index is only built when the page has eligible annotations.
    pub async fn run_page(&self, store: &AnnotationStore, page: &PageContent) -> ReanchorReport {
        let pending = store
            .on_page(page.page_number)
            .await
            .iter()
            .any(|a| self.matcher.is_eligible(a));
        if !pending {
            return ReanchorReport {
                page_number: page.page_number,
                ..Default::default()
            };
        }

        let index = self.cache.get_or_build(page);
        let mut report = None;
        store
            .refine_page(page.page_number, |annotations| {
                let batch = self.matcher.reanchor_page(&index, annotations);
                let ids = batch.refined.clone();
                report = Some(batch);
                ids
            })
            .await;

        report.unwrap_or_else(|| ReanchorReport {
            page_number: page.page_number,
            ..Default::default()
        })
    }

    /// Re-anchor several pages; batches are independent of each other
    pub async fn run_pages(&self, store: &AnnotationStore, pages: &[PageContent]) -> Vec<ReanchorReport> {
        join_all(pages.iter().map(|page| self.run_page(store, page))).await
    }
}
