//! Configuration management for the Anchorage engine

use std::env;
use std::time::Duration;

use serde::Deserialize;

/// Default trailing citation noise pattern, e.g. `"... (Author, J., dissenting)"`
pub const DEFAULT_NOISE_PATTERN: &str =
    r"\s*\((?:[^()]*\b(?:dissenting|concurring|concurring in part|plurality|per curiam)\b[^()]*)\)\s*$";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub reanchor: ReanchorConfig,
    pub navigation: NavigationConfig,
    pub store: StoreConfig,
    /// Number of page text indexes kept in memory
    pub text_cache_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReanchorConfig {
    /// Regex matching the trailing parenthetical stripped before matching
    pub noise_pattern: String,
    /// Vertical tolerance used when grouping matched characters into lines
    pub line_tolerance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigationConfig {
    /// Attempts made while waiting for the target to render
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly afterwards
    pub base_delay_ms: u64,
    /// Space left above the annotation after scrolling
    pub margin_px: f64,
    /// Accepted distance between requested and final scroll offset
    pub tolerance_px: f64,
    /// Time allowed for a smooth scroll to finish before verification
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Author recorded on locally created annotations
    pub created_by: String,
    /// Capacity of the subscriber event channel
    pub event_capacity: usize,
}

impl Default for ReanchorConfig {
    fn default() -> Self {
        Self {
            noise_pattern: DEFAULT_NOISE_PATTERN.to_string(),
            line_tolerance: 5.0,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            margin_px: 80.0,
            tolerance_px: 4.0,
            settle_ms: 400,
        }
    }
}

impl NavigationConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt.max(1))))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            created_by: "local".to_string(),
            event_capacity: 256,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            reanchor: ReanchorConfig::default(),
            navigation: NavigationConfig::default(),
            store: StoreConfig::default(),
            text_cache_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Build configuration from `ANCHOR_*` environment variables
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();

        EngineConfig {
            reanchor: ReanchorConfig {
                noise_pattern: env::var("ANCHOR_NOISE_PATTERN")
                    .unwrap_or(defaults.reanchor.noise_pattern),
                line_tolerance: parse_var("ANCHOR_LINE_TOLERANCE", defaults.reanchor.line_tolerance),
            },
            navigation: NavigationConfig {
                max_attempts: parse_var("ANCHOR_NAV_MAX_ATTEMPTS", defaults.navigation.max_attempts),
                base_delay_ms: parse_var("ANCHOR_NAV_BASE_DELAY_MS", defaults.navigation.base_delay_ms),
                margin_px: parse_var("ANCHOR_NAV_MARGIN_PX", defaults.navigation.margin_px),
                tolerance_px: parse_var("ANCHOR_NAV_TOLERANCE_PX", defaults.navigation.tolerance_px),
                settle_ms: parse_var("ANCHOR_NAV_SETTLE_MS", defaults.navigation.settle_ms),
            },
            store: StoreConfig {
                created_by: env::var("ANCHOR_USER").unwrap_or(defaults.store.created_by),
                event_capacity: parse_var("ANCHOR_EVENT_CAPACITY", defaults.store.event_capacity),
            },
            text_cache_capacity: parse_var("ANCHOR_TEXT_CACHE", defaults.text_cache_capacity),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
