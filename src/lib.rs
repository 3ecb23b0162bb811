//! BandScrub - band scrubber core for multi-band raster layers.
//!
//! Lets a GIS host application scrub through the bands of a multi-band
//! raster (hyperspectral or time-series stacks) with a slider, rendering
//! each band through an auto-stretched grayscale contrast enhancement.
//! Before scrubbing, a background job warms the raster provider's read
//! cache and computes per-band stretch bounds so slider motion never
//! re-triggers expensive I/O.
//!
//! The host supplies the GUI widgets and the raster plumbing through the
//! traits in [`raster`]; this crate owns the cache-warming job and the
//! scrubber state machine.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod job;
pub mod raster;
pub mod stats;

pub use config::ScrubConfig;
pub use controller::{Progress, ScrubController, ScrubState, Status};
pub use error::{ProviderError, ScrubError};
pub use job::{JobEvent, JobHandle, WarmParams};
pub use raster::{
    BandStatistics, Extent, LayerId, MapHost, RasterDataType, RasterLayer, RasterProvider,
    ViewWindow,
};
pub use stats::{BandStats, StatsTable, next_band, stretch_range};
