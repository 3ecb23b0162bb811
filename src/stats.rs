//! Per-band contrast-stretch bounds and the lookup table handed from the
//! cache-warming job to the controller.

use std::collections::HashMap;

use crate::constants::FALLBACK_CONTRAST_RANGE;
use crate::raster::BandStatistics;

/// Clamped contrast-stretch bounds for one band.
///
/// Immutable once computed; produced by `stretch_range` during a
/// preparation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    /// Lower bound of the display stretch window
    pub low: f64,
    /// Upper bound of the display stretch window
    pub high: f64,
}

/// Compute the contrast-stretch window for a band from sampled statistics.
///
/// The window is `mean ± multiplier·std_dev`, clamped to the observed
/// `[minimum, maximum]` range. A degenerate window (high ≤ low after
/// clamping, e.g. a constant band) falls back to the full observed range.
pub fn stretch_range(stats: &BandStatistics, multiplier: f64) -> BandStats {
    let mut low = stats.mean - multiplier * stats.std_dev;
    let mut high = stats.mean + multiplier * stats.std_dev;

    if low < stats.minimum {
        low = stats.minimum;
    }
    if high > stats.maximum {
        high = stats.maximum;
    }
    if high <= low {
        low = stats.minimum;
        high = stats.maximum;
    }

    BandStats { low, high }
}

/// Lookup table from band index (1-based) to contrast-stretch bounds.
///
/// Exactly one table is live at a time, owned by the controller. A job
/// populates its own table and hands it over wholesale on completion; the
/// controller never mutates a table in place, it replaces the reference.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    entries: HashMap<u32, BandStats>,
}

impl StatsTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bands in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store stretch bounds for a band. Used by the job while building the
    /// table; not called on a live table.
    pub fn insert(&mut self, band: u32, stats: BandStats) {
        self.entries.insert(band, stats);
    }

    /// Stretch bounds for a band, if present.
    pub fn get(&self, band: u32) -> Option<BandStats> {
        self.entries.get(&band).copied()
    }

    /// Stretch bounds for a band, falling back to the default display range
    /// for a band that is missing. A miss should not happen in Ready state;
    /// the fallback keeps the render path total.
    pub fn get_or_fallback(&self, band: u32) -> BandStats {
        self.get(band).unwrap_or(BandStats {
            low: FALLBACK_CONTRAST_RANGE.0,
            high: FALLBACK_CONTRAST_RANGE.1,
        })
    }
}

/// Advance a band index by one with wraparound, for play mode.
///
/// Maps `i` to `i + 1` for `i < band_count` and `band_count` back to 1.
pub fn next_band(current: u32, band_count: u32) -> u32 {
    if current < band_count { current + 1 } else { 1 }
}
