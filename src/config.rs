//! Tuning configuration for the band scrubber.
//!
//! The stretch multiplier and sample cap are policy choices, not
//! correctness requirements, so they live here as overridable fields
//! instead of hard-coded values. The config serializes to JSON so a host
//! can persist or ship site-specific tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_WARM_DIMENSION, PLAY_INTERVAL_MS, STATS_SAMPLE_SIZE, STRETCH_STDDEV_MULTIPLIER,
};

/// Tuning knobs for cache warming and playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrubConfig {
    /// Standard-deviation multiplier for the contrast-stretch window
    #[serde(default = "default_stretch_multiplier")]
    pub stretch_stddev_multiplier: f64,

    /// Maximum number of pixels sampled per band for statistics
    #[serde(default = "default_sample_size")]
    pub stats_sample_size: u32,

    /// Play-mode advance interval in milliseconds
    #[serde(default = "default_play_interval_ms")]
    pub play_interval_ms: u64,

    /// Cap on each warm-read window dimension in pixels
    #[serde(default = "default_max_warm_dimension")]
    pub max_warm_dimension: u32,
}

fn default_stretch_multiplier() -> f64 {
    STRETCH_STDDEV_MULTIPLIER
}

fn default_sample_size() -> u32 {
    STATS_SAMPLE_SIZE
}

fn default_play_interval_ms() -> u64 {
    PLAY_INTERVAL_MS
}

fn default_max_warm_dimension() -> u32 {
    MAX_WARM_DIMENSION
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            stretch_stddev_multiplier: default_stretch_multiplier(),
            stats_sample_size: default_sample_size(),
            play_interval_ms: default_play_interval_ms(),
            max_warm_dimension: default_max_warm_dimension(),
        }
    }
}

impl ScrubConfig {
    /// Play-mode advance interval as a `Duration`.
    pub fn play_interval(&self) -> Duration {
        Duration::from_millis(self.play_interval_ms)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
