//! Viewer-side coordination
//!
//! - `visibility`: current page from page intersection ratios
//! - `navigator`: scroll to a page or an annotation, retry-safe
//! - `overlay`: viewport rects to draw for the annotations of a page
//!
//! The tracker and the navigator share a `ViewerState`: the current page and
//! the "programmatic scroll in flight" flag that keeps the tracker from
//! fighting a navigation.

mod navigator;
mod overlay;
mod visibility;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

pub use navigator::{NavigationOutcome, ScrollNavigator, ViewportSurface};
pub use overlay::{overlay_items, OverlayItem};
pub use visibility::VisibilityTracker;

/// Page selection state shared by the tracker and the navigator
#[derive(Clone)]
pub struct ViewerState {
    inner: Arc<ViewerStateInner>,
}

struct ViewerStateInner {
    page: watch::Sender<u32>,
    scrolling: AtomicBool,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ViewerState {
    pub fn new(initial_page: u32) -> Self {
        let (page, _) = watch::channel(initial_page);
        Self {
            inner: Arc::new(ViewerStateInner {
                page,
                scrolling: AtomicBool::new(false),
            }),
        }
    }

    pub fn current_page(&self) -> u32 {
        *self.inner.page.borrow()
    }

    /// Watch current page changes
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.inner.page.subscribe()
    }

    /// Set the current page; returns whether it changed
    pub fn set_current_page(&self, page: u32) -> bool {
        self.inner.page.send_if_modified(|current| {
            if *current == page {
                false
            } else {
                *current = page;
                true
            }
        })
    }

    /// Whether a programmatic scroll is in flight
    pub fn is_scrolling(&self) -> bool {
        self.inner.scrolling.load(Ordering::Acquire)
    }

    fn set_scrolling(&self, scrolling: bool) {
        self.inner.scrolling.store(scrolling, Ordering::Release);
    }
}
