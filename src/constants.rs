//! Policy constants for cache warming and playback.
//!
//! These are tuning choices rather than correctness requirements;
//! `ScrubConfig` exposes each of them as an overridable field.

/// Multiplier applied to the standard deviation when computing the
/// contrast-stretch window around the band mean.
pub const STRETCH_STDDEV_MULTIPLIER: f64 = 2.0;

/// Upper bound on the number of pixels sampled per band when requesting
/// statistics from the provider.
pub const STATS_SAMPLE_SIZE: u32 = 25_000;

/// Interval between automatic band advances in play mode, in milliseconds.
pub const PLAY_INTERVAL_MS: u64 = 200;

/// Cap on each dimension of the warm-read window, in pixels. Keeps the
/// cache-warming block reads bounded on very large canvases.
pub const MAX_WARM_DIMENSION: u32 = 1000;

/// Contrast range applied when a band is missing from the stats table.
pub const FALLBACK_CONTRAST_RANGE: (f64, f64) = (0.0, 255.0);
