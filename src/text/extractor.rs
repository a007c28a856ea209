//! Per-page character stream and geometry map

use crate::geometry::Rect;

use super::types::{PageContent, TextRun};

/// Position of a `full_text` character inside the renderer's runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRef {
    pub run_index: usize,
    /// Offset in characters within the run
    pub offset: usize,
}

/// Searchable text of one page
///
/// `full_text` is the concatenation of every run. `normalized` drops every
/// whitespace character; `norm_to_raw[j]` is the `full_text` index of the j-th
/// normalized character.
#[derive(Debug, Clone)]
pub struct PageTextIndex {
    page_number: u32,
    page_height: f64,
    fingerprint: u64,
    runs: Vec<TextRun>,
    /// Character count per run
    run_lengths: Vec<usize>,
    full_text: Vec<char>,
    char_map: Vec<CharRef>,
    normalized: Vec<char>,
    norm_to_raw: Vec<usize>,
}

impl PageTextIndex {
    /// Build the index for a page
    pub fn build(page: &PageContent) -> Self {
        let mut full_text = Vec::new();
        let mut char_map = Vec::new();
        let mut run_lengths = Vec::with_capacity(page.runs.len());

        for (run_index, run) in page.runs.iter().enumerate() {
            let mut len = 0;
            for (offset, c) in run.text.chars().enumerate() {
                full_text.push(c);
                char_map.push(CharRef { run_index, offset });
                len += 1;
            }
            run_lengths.push(len);
        }

        let mut normalized = Vec::with_capacity(full_text.len());
        let mut norm_to_raw = Vec::with_capacity(full_text.len());
        for (raw, c) in full_text.iter().enumerate() {
            if !c.is_whitespace() {
                normalized.push(*c);
                norm_to_raw.push(raw);
            }
        }

        tracing::debug!(
            page = page.page_number,
            runs = page.runs.len(),
            chars = full_text.len(),
            "Built page text index"
        );

        Self {
            page_number: page.page_number,
            page_height: page.height,
            fingerprint: page.fingerprint(),
            runs: page.runs.clone(),
            run_lengths,
            full_text,
            char_map,
            normalized,
            norm_to_raw,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn full_text(&self) -> String {
        self.full_text.iter().collect()
    }

    pub fn normalized_text(&self) -> String {
        self.normalized.iter().collect()
    }

    pub fn char_ref(&self, raw_index: usize) -> Option<CharRef> {
        self.char_map.get(raw_index).copied()
    }

    /// `full_text` index of a normalized character
    pub fn raw_index(&self, norm_index: usize) -> Option<usize> {
        self.norm_to_raw.get(norm_index).copied()
    }

    /// Estimated rect of a `full_text` character, top-left origin
    ///
    /// Characters share their run's width evenly.
    pub fn char_rect(&self, raw_index: usize) -> Option<Rect> {
        let CharRef { run_index, offset } = self.char_ref(raw_index)?;
        let run = &self.runs[run_index];
        let len = self.run_lengths[run_index].max(1);
        let char_width = run.width / len as f64;

        Some(Rect {
            x: run.origin_x + offset as f64 * char_width,
            y: self.page_height - (run.origin_y + run.height),
            width: char_width,
            height: run.height,
        })
    }

    /// Start indices of every non-overlapping occurrence of `needle` in the
    /// normalized text, in document order
    pub fn find_normalized(&self, needle: &[char]) -> Vec<usize> {
        let mut hits = Vec::new();
        if needle.is_empty() || needle.len() > self.normalized.len() {
            return hits;
        }

        let mut start = 0;
        while start + needle.len() <= self.normalized.len() {
            if self.normalized[start..start + needle.len()] == *needle {
                hits.push(start);
                start += needle.len();
            } else {
                start += 1;
            }
        }
        hits
    }

    /// Raw `[start, end)` span covered by a normalized span
    pub fn raw_span(&self, norm_start: usize, norm_len: usize) -> Option<(usize, usize)> {
        if norm_len == 0 {
            return None;
        }
        let first = self.raw_index(norm_start)?;
        let last = self.raw_index(norm_start + norm_len - 1)?;
        Some((first, last + 1))
    }

    /// Rects of the visible characters in a raw span
    ///
    /// Whitespace inside the span is skipped: its estimated geometry can sit
    /// between lines and would stretch the line boxes.
    pub fn span_rects(&self, raw_start: usize, raw_end: usize) -> Vec<Rect> {
        (raw_start..raw_end.min(self.full_text.len()))
            .filter(|&i| !self.full_text[i].is_whitespace())
            .filter_map(|i| self.char_rect(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f64, baseline: f64, width: f64) -> TextRun {
        TextRun {
            text: text.to_string(),
            origin_x: x,
            origin_y: baseline,
            width,
            height: 10.0,
        }
    }

    fn page(runs: Vec<TextRun>) -> PageContent {
        PageContent {
            page_number: 4,
            width: 600.0,
            height: 800.0,
            runs,
        }
    }

    #[test]
    fn test_full_and_normalized_text() {
        let index = PageTextIndex::build(&page(vec![
            run("The quick ", 0.0, 700.0, 100.0),
            run("brown\tfox", 100.0, 700.0, 90.0),
        ]));

        assert_eq!(index.full_text(), "The quick brown\tfox");
        assert_eq!(index.normalized_text(), "Thequickbrownfox");
        // 'q' is the 4th normalized char, 5th raw char
        assert_eq!(index.raw_index(3), Some(4));
        assert_eq!(index.char_ref(11), Some(CharRef { run_index: 1, offset: 1 }));
    }

    #[test]
    fn test_char_rect_flips_baseline_origin() {
        let index = PageTextIndex::build(&page(vec![run("abcd", 50.0, 700.0, 40.0)]));
        let rect = index.char_rect(2).unwrap();
        assert_eq!(rect, Rect::new(70.0, 90.0, 10.0, 10.0));
        assert!(index.char_rect(4).is_none());
    }

    #[test]
    fn test_find_is_non_overlapping() {
        let index = PageTextIndex::build(&page(vec![run("aaaa a", 0.0, 0.0, 60.0)]));
        let needle: Vec<char> = "aa".chars().collect();
        assert_eq!(index.find_normalized(&needle), vec![0, 2]);
    }

    #[test]
    fn test_find_empty_needle() {
        let index = PageTextIndex::build(&page(vec![run("abc", 0.0, 0.0, 30.0)]));
        assert!(index.find_normalized(&[]).is_empty());
    }

    #[test]
    fn test_raw_span_covers_inner_whitespace() {
        let index = PageTextIndex::build(&page(vec![run("ab  cd", 0.0, 0.0, 60.0)]));
        // normalized "abcd": "bc" starts at 1
        assert_eq!(index.raw_span(1, 2), Some((1, 5)));
        assert_eq!(index.span_rects(1, 5).len(), 2);
    }

    #[test]
    fn test_empty_run_has_no_chars() {
        let index = PageTextIndex::build(&page(vec![run("", 0.0, 0.0, 0.0), run("x", 0.0, 0.0, 5.0)]));
        assert_eq!(index.char_ref(0), Some(CharRef { run_index: 1, offset: 0 }));
    }
}
