//! Current page tracking from intersection ratios

use std::collections::HashMap;

use super::ViewerState;

/// Tracks how much of each rendered page is visible
pub struct VisibilityTracker {
    ratios: HashMap<u32, f64>,
    state: ViewerState,
}

impl VisibilityTracker {
    pub fn new(state: ViewerState) -> Self {
        Self {
            ratios: HashMap::new(),
            state,
        }
    }

    /// Record a batch of `(page, intersection ratio)` observations
    ///
    /// Pages with a zero ratio stop intersecting and are forgotten. Returns the
    /// new current page when it changed. While a programmatic scroll is in
    /// flight the ratios are still recorded but the page is left alone.
    pub fn observe(&mut self, entries: &[(u32, f64)]) -> Option<u32> {
        for &(page, ratio) in entries {
            if ratio > 0.0 && ratio.is_finite() {
                self.ratios.insert(page, ratio);
            } else {
                self.ratios.remove(&page);
            }
        }

        if self.state.is_scrolling() {
            return None;
        }

        let page = self.most_visible()?;
        self.state.set_current_page(page).then_some(page)
    }

    /// Page with the largest ratio; ties go to the lower page number
    pub fn most_visible(&self) -> Option<u32> {
        self.ratios
            .iter()
            .max_by(|(pa, ra), (pb, rb)| ra.total_cmp(rb).then(pb.cmp(pa)))
            .map(|(page, _)| *page)
    }

    pub fn ratio(&self, page: u32) -> Option<f64> {
        self.ratios.get(&page).copied()
    }
}
