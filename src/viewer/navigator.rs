//! Scroll navigation to pages and annotations
//!
//! Pages render lazily, so the annotation element may not exist when a
//! navigation starts. The navigator polls with a growing delay, waking early
//! on render notifications, then scrolls so the annotation sits a fixed margin
//! below the top of the container. If the final position is off, it falls back
//! to the surface's generic scroll-into-view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, warn};

use super::ViewerState;
use crate::config::NavigationConfig;
use crate::geometry::Rect;

/// What the navigator needs from the rendered viewer
///
/// Rects are in viewport space.
pub trait ViewportSurface: Send + Sync {
    /// Scroll container bounds
    fn container_rect(&self) -> Rect;

    fn scroll_top(&self) -> f64;

    /// Bounds of a page, `None` while it is not rendered
    fn page_rect(&self, page_number: u32) -> Option<Rect>;

    /// Bounds of an annotation element, `None` while it is not rendered
    fn annotation_rect(&self, annotation_id: &str) -> Option<Rect>;

    /// Smooth scroll the container to an absolute offset
    fn scroll_to(&self, offset: f64);

    fn scroll_page_into_view(&self, page_number: u32);

    fn scroll_annotation_into_view(&self, annotation_id: &str);
}

/// How a navigation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Scrolled to the computed offset and verified it
    Scrolled,
    /// Offset verification failed; generic scroll-into-view was used
    FellBack,
    /// Annotation never rendered; scrolled to its page instead
    Exhausted,
    /// A newer navigation started before this one finished
    Superseded,
}

/// Navigates the viewer; cheap to clone
#[derive(Clone)]
pub struct ScrollNavigator {
    inner: Arc<NavigatorInner>,
}

struct NavigatorInner {
    surface: Arc<dyn ViewportSurface>,
    state: ViewerState,
    config: NavigationConfig,
    generation: AtomicU64,
    rendered: Notify,
}

impl ScrollNavigator {
    pub fn new(surface: Arc<dyn ViewportSurface>, state: ViewerState, config: NavigationConfig) -> Self {
        Self {
            inner: Arc::new(NavigatorInner {
                surface,
                state,
                config,
                generation: AtomicU64::new(0),
                rendered: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.inner.state
    }

    /// Signal that pages finished rendering; wakes pending navigations early
    pub fn notify_rendered(&self) {
        self.inner.rendered.notify_waiters();
    }

    /// Scroll to a page; returns false when it is already current
    ///
    /// Any navigation still in flight is abandoned.
    pub fn go_to_page(&self, page_number: u32) -> bool {
        self.begin();
        self.inner.state.set_scrolling(false);

        if page_number == self.inner.state.current_page() {
            return false;
        }
        self.inner.surface.scroll_page_into_view(page_number);
        self.inner.state.set_current_page(page_number);
        true
    }

    /// Scroll to an annotation on a page
    ///
    /// Never fails: when the annotation cannot be reached the page is shown
    /// instead.
    pub async fn go_to_annotation(&self, page_number: u32, annotation_id: &str) -> NavigationOutcome {
        let generation = self.begin();
        self.inner.state.set_scrolling(true);

        let outcome = self.navigate(generation, page_number, annotation_id).await;

        if self.is_current(generation) {
            self.inner.state.set_scrolling(false);
            self.inner.state.set_current_page(page_number);
        }
        debug!(page = page_number, annotation_id = %annotation_id, ?outcome, "Navigation finished");
        outcome
    }

    async fn navigate(&self, generation: u64, page_number: u32, annotation_id: &str) -> NavigationOutcome {
        let surface = &self.inner.surface;
        let config = &self.inner.config;

        let mut found = None;
        for attempt in 1..=config.max_attempts {
            if !self.is_current(generation) {
                return NavigationOutcome::Superseded;
            }
            if let Some(rects) = surface.annotation_rect(annotation_id).zip(surface.page_rect(page_number)) {
                found = Some(rects);
                break;
            }
            if attempt == config.max_attempts {
                break;
            }
            tokio::select! {
                _ = self.inner.rendered.notified() => {}
                _ = tokio::time::sleep(config.backoff(attempt)) => {}
            }
        }

        if !self.is_current(generation) {
            return NavigationOutcome::Superseded;
        }

        let Some((annotation, page)) = found else {
            warn!(
                page = page_number,
                annotation_id = %annotation_id,
                attempts = config.max_attempts,
                "Annotation not rendered, scrolling to page"
            );
            surface.scroll_page_into_view(page_number);
            return NavigationOutcome::Exhausted;
        };

        let container = surface.container_rect();
        let page_offset = page.y - container.y;
        let annotation_offset = annotation.y - page.y;
        let target = (surface.scroll_top() + page_offset + annotation_offset - config.margin_px).max(0.0);
        surface.scroll_to(target);

        tokio::time::sleep(config.settle()).await;
        if !self.is_current(generation) {
            return NavigationOutcome::Superseded;
        }

        let landed = surface.scroll_top();
        if (landed - target).abs() > config.tolerance_px {
            debug!(target, landed, "Scroll offset off target, using scroll into view");
            surface.scroll_annotation_into_view(annotation_id);
            return NavigationOutcome::FellBack;
        }
        NavigationOutcome::Scrolled
    }

    fn begin(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::Acquire) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum SurfaceCall {
        ScrollTo(f64),
        PageIntoView(u32),
        AnnotationIntoView(String),
    }

    #[derive(Default)]
    struct MockSurface {
        pages: Mutex<HashMap<u32, Rect>>,
        annotations: Mutex<HashMap<String, Rect>>,
        scroll_top: Mutex<f64>,
        lookups: Mutex<u32>,
        calls: Mutex<Vec<SurfaceCall>>,
        /// Ignore `scroll_to`, as if the user grabbed the scrollbar
        stuck: bool,
    }

    impl MockSurface {
        fn with_page(self, page: u32, rect: Rect) -> Self {
            self.pages.lock().insert(page, rect);
            self
        }

        fn add_annotation(&self, id: &str, rect: Rect) {
            self.annotations.lock().insert(id.to_string(), rect);
        }

        fn calls(&self) -> Vec<SurfaceCall> {
            self.calls.lock().clone()
        }
    }

    impl ViewportSurface for MockSurface {
        fn container_rect(&self) -> Rect {
            Rect::new(0.0, 100.0, 800.0, 600.0)
        }

        fn scroll_top(&self) -> f64 {
            *self.scroll_top.lock()
        }

        fn page_rect(&self, page_number: u32) -> Option<Rect> {
            self.pages.lock().get(&page_number).copied()
        }

        fn annotation_rect(&self, annotation_id: &str) -> Option<Rect> {
            *self.lookups.lock() += 1;
            self.annotations.lock().get(annotation_id).copied()
        }

        fn scroll_to(&self, offset: f64) {
            self.calls.lock().push(SurfaceCall::ScrollTo(offset));
            if !self.stuck {
                *self.scroll_top.lock() = offset;
            }
        }

        fn scroll_page_into_view(&self, page_number: u32) {
            self.calls.lock().push(SurfaceCall::PageIntoView(page_number));
        }

        fn scroll_annotation_into_view(&self, annotation_id: &str) {
            self.calls
                .lock()
                .push(SurfaceCall::AnnotationIntoView(annotation_id.to_string()));
        }
    }

    fn surface() -> MockSurface {
        let surface = MockSurface::default().with_page(3, Rect::new(0.0, 300.0, 612.0, 792.0));
        *surface.scroll_top.lock() = 500.0;
        surface
    }

    fn navigator(surface: Arc<MockSurface>) -> ScrollNavigator {
        ScrollNavigator::new(surface, ViewerState::default(), NavigationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrolls_with_margin() {
        let surface = Arc::new(surface());
        surface.add_annotation("a", Rect::new(50.0, 450.0, 100.0, 12.0));
        let nav = navigator(surface.clone());

        let outcome = nav.go_to_annotation(3, "a").await;
        assert_eq!(outcome, NavigationOutcome::Scrolled);
        // 500 + (300 - 100) + (450 - 300) - 80
        assert_eq!(surface.calls(), vec![SurfaceCall::ScrollTo(770.0)]);
        assert_eq!(nav.state().current_page(), 3);
        assert!(!nav.state().is_scrolling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_annotation_exhausts_budget() {
        let surface = Arc::new(surface());
        let nav = navigator(surface.clone());

        let outcome = nav.go_to_annotation(3, "x").await;
        assert_eq!(outcome, NavigationOutcome::Exhausted);
        assert_eq!(*surface.lookups.lock(), 5);
        assert_eq!(surface.calls(), vec![SurfaceCall::PageIntoView(3)]);
        assert!(!nav.state().is_scrolling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_notification_wakes_retry() {
        let surface = Arc::new(surface());
        let nav = navigator(surface.clone());

        let late = surface.clone();
        let notifier = nav.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            late.add_annotation("a", Rect::new(50.0, 450.0, 100.0, 12.0));
            notifier.notify_rendered();
        });

        let outcome = nav.go_to_annotation(3, "a").await;
        assert_eq!(outcome, NavigationOutcome::Scrolled);
        // t=0 and t=100 miss, the notification at t=150 triggers the third
        assert_eq!(*surface.lookups.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_target_falls_back() {
        let surface = Arc::new(MockSurface {
            stuck: true,
            ..surface()
        });
        surface.add_annotation("a", Rect::new(50.0, 450.0, 100.0, 12.0));
        let nav = navigator(surface.clone());

        let outcome = nav.go_to_annotation(3, "a").await;
        assert_eq!(outcome, NavigationOutcome::FellBack);
        assert_eq!(
            surface.calls().last(),
            Some(&SurfaceCall::AnnotationIntoView("a".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_navigation_supersedes() {
        let surface = Arc::new(surface().with_page(5, Rect::new(0.0, 200.0, 612.0, 792.0)));
        surface.add_annotation("b", Rect::new(50.0, 260.0, 100.0, 12.0));
        let nav = navigator(surface.clone());

        let first = {
            let nav = nav.clone();
            tokio::spawn(async move { nav.go_to_annotation(3, "missing").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = nav.go_to_annotation(5, "b").await;
        assert_eq!(second, NavigationOutcome::Scrolled);
        assert_eq!(first.await.unwrap(), NavigationOutcome::Superseded);

        assert_eq!(nav.state().current_page(), 5);
        assert!(!nav.state().is_scrolling());
        assert!(!surface.calls().contains(&SurfaceCall::PageIntoView(3)));
    }

    #[tokio::test]
    async fn test_go_to_page() {
        let surface = Arc::new(surface());
        let nav = navigator(surface.clone());

        assert!(!nav.go_to_page(1));
        assert!(nav.go_to_page(3));
        assert_eq!(nav.state().current_page(), 3);
        assert_eq!(surface.calls(), vec![SurfaceCall::PageIntoView(3)]);
    }
}
