//! Page text extraction
//!
//! Builds a searchable, whitespace-normalized character stream per page with
//! a way back to per-character geometry.
//!
//! - `extractor`: text runs -> `PageTextIndex`
//! - `cache`: per-page LRU cache, rebuilt only when the page text changes

mod cache;
mod extractor;
mod types;

pub use cache::PageTextCache;
pub use extractor::{CharRef, PageTextIndex};
pub use types::{PageContent, TextRun};
