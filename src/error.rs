//! Error types for the Anchorage engine

use thiserror::Error;

use crate::annotations::StoreError;
use crate::geometry::GeometryError;
use crate::ingest::IngestError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AnchorError>;

/// Top-level error type
///
/// Components return their own error enums; this collects them for callers
/// that drive several components at once (the fixture binary, integration code).
#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),

    #[error("Invalid noise pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors raised while loading a document fixture
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Page {0} appears more than once")]
    DuplicatePage(u32),
}
