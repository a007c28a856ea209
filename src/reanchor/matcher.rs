//! Text-search relocation of annotation geometry

use regex::Regex;
use serde::Serialize;

use crate::annotations::Annotation;
use crate::config::ReanchorConfig;
use crate::geometry::{merge_rects, merge_rects_by_line, Rect};
use crate::text::PageTextIndex;

/// One occurrence of an annotation's text on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Start in the normalized text
    pub norm_start: usize,
    /// Raw `full_text` span, end exclusive
    pub raw_start: usize,
    pub raw_end: usize,
    /// Rects of the matched characters
    pub char_rects: Vec<Rect>,
    /// Bounding box of `char_rects`
    pub bounds: Rect,
}

/// Result of re-anchoring one annotation
#[derive(Debug, Clone, PartialEq)]
pub enum ReanchorOutcome {
    /// Already refined, or neither auto-generated nor carrying citation noise
    NotEligible,
    /// Nothing left to search after stripping noise and whitespace
    EmptyText,
    /// Text not found on the page; geometry kept
    NoMatch,
    /// Geometry replaced by occurrence `chosen` of `occurrences`
    Matched { chosen: usize, occurrences: usize },
}

/// Summary of a page batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReanchorReport {
    pub page_number: u32,
    /// Ids marked refined by this batch
    pub refined: Vec<String>,
    pub matched: usize,
    pub unmatched: usize,
    pub empty: usize,
}

/// Relocates annotations by searching their text in a page index
pub struct ReanchorMatcher {
    noise: Regex,
    line_tolerance: f64,
}

impl ReanchorMatcher {
    pub fn new(config: &ReanchorConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            noise: Regex::new(&config.noise_pattern)?,
            line_tolerance: config.line_tolerance,
        })
    }

    /// Whether the text ends in a citation parenthetical
    pub fn has_noise(&self, text: &str) -> bool {
        self.noise.is_match(text)
    }

    /// Text with the trailing citation parenthetical removed
    pub fn strip_noise<'t>(&self, text: &'t str) -> &'t str {
        match self.noise.find(text) {
            Some(m) => &text[..m.start()],
            None => text,
        }
    }

    /// Normalized search key: noise stripped, every whitespace char removed
    pub fn search_key(&self, text: &str) -> Vec<char> {
        self.strip_noise(text)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    pub fn is_eligible(&self, annotation: &Annotation) -> bool {
        !annotation.refined && (annotation.is_auto() || self.has_noise(&annotation.text_selected))
    }

    /// Every occurrence of `key` on the page, in document order
    pub fn candidates(&self, index: &PageTextIndex, key: &[char]) -> Vec<Candidate> {
        index
            .find_normalized(key)
            .into_iter()
            .filter_map(|norm_start| {
                let (raw_start, raw_end) = index.raw_span(norm_start, key.len())?;
                let char_rects = index.span_rects(raw_start, raw_end);
                let bounds = merge_rects(&char_rects)?;
                Some(Candidate {
                    norm_start,
                    raw_start,
                    raw_end,
                    char_rects,
                    bounds,
                })
            })
            .collect()
    }

    /// Pick the occurrence to anchor to
    ///
    /// With usable prior geometry the occurrence whose center is closest to the
    /// prior center wins; otherwise the first occurrence.
    pub fn choose(candidates: &[Candidate], prior: &Rect) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        if prior.is_degenerate() {
            return Some(0);
        }

        let target = prior.center();
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.bounds
                    .center()
                    .distance(target)
                    .total_cmp(&b.bounds.center().distance(target))
            })
            .map(|(i, _)| i)
    }

    /// Re-anchor one annotation against a page index
    ///
    /// Eligible annotations always end up refined, whatever the outcome.
    pub fn reanchor(&self, index: &PageTextIndex, annotation: &mut Annotation) -> ReanchorOutcome {
        if !self.is_eligible(annotation) {
            return ReanchorOutcome::NotEligible;
        }
        annotation.refined = true;

        let key = self.search_key(&annotation.text_selected);
        if key.is_empty() {
            return ReanchorOutcome::EmptyText;
        }

        let candidates = self.candidates(index, &key);
        let Some(chosen) = Self::choose(&candidates, &annotation.location.coordinates) else {
            tracing::debug!(id = %annotation.id, page = index.page_number(), "No text match, keeping geometry");
            return ReanchorOutcome::NoMatch;
        };

        let candidate = &candidates[chosen];
        let location = &mut annotation.location;
        location.coordinates = candidate.bounds;
        location.coordinates_list = merge_rects_by_line(&candidate.char_rects, self.line_tolerance);
        location.char_start = Some(candidate.raw_start);
        location.char_end = Some(candidate.raw_end);

        ReanchorOutcome::Matched {
            chosen,
            occurrences: candidates.len(),
        }
    }

    /// Re-anchor every eligible annotation of one page, sequentially
    pub fn reanchor_page<'a, I>(&self, index: &PageTextIndex, annotations: I) -> ReanchorReport
    where
        I: IntoIterator<Item = &'a mut Annotation>,
    {
        let mut report = ReanchorReport {
            page_number: index.page_number(),
            ..Default::default()
        };

        for annotation in annotations {
            match self.reanchor(index, annotation) {
                ReanchorOutcome::NotEligible => continue,
                ReanchorOutcome::EmptyText => report.empty += 1,
                ReanchorOutcome::NoMatch => report.unmatched += 1,
                ReanchorOutcome::Matched { .. } => report.matched += 1,
            }
            report.refined.push(annotation.id.clone());
        }

        if !report.refined.is_empty() {
            tracing::info!(
                page = report.page_number,
                matched = report.matched,
                unmatched = report.unmatched,
                empty = report.empty,
                "Re-anchored page annotations"
            );
        }
        report
    }
}
