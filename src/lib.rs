//! Anchorage Library
//!
//! Positioning and re-anchoring engine for PDF annotations.
//!
//! # Modules
//!
//! - `geometry`: document/viewport transforms, rect merging, bbox layouts
//! - `text`: per-page character geometry and normalized text search
//! - `reanchor`: relocating annotations whose stored geometry is unreliable
//! - `annotations`: annotation model, persistence records, optimistic store
//! - `viewer`: visibility tracking, scroll navigation, overlay projection
//! - `ingest`: auto-annotation job ingestion
//! - `fixture`: JSON document fixtures for offline runs

pub mod annotations;
pub mod config;
pub mod error;
pub mod fixture;
pub mod geometry;
pub mod ingest;
pub mod reanchor;
pub mod text;
pub mod viewer;

pub use error::{AnchorError, Result};
