//! Trait seams to the hosting GIS application.
//!
//! The scrubber core never reads pixels or paints anything itself. It talks
//! to the host through three capabilities: the raster data provider (block
//! reads and sampled statistics), the raster layer (renderer control and
//! repaint), and the map host (view snapshot, layer selection, legend
//! refresh). Each is a trait so the core can be driven by the real host
//! bindings or by mocks in tests.

use std::sync::Arc;

use crate::error::ProviderError;

/// Geographic bounding box of a map view, in layer CRS units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Minimum x coordinate
    pub x_min: f64,
    /// Minimum y coordinate
    pub y_min: f64,
    /// Maximum x coordinate
    pub x_max: f64,
    /// Maximum y coordinate
    pub y_max: f64,
}

impl Extent {
    /// Create an extent from corner coordinates.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

/// Snapshot of the map view at the moment a preparation run starts.
///
/// Frozen for the lifetime of one cache-warming job; later pan/zoom does
/// not retroactively affect an in-flight job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    /// Visible extent at snapshot time
    pub extent: Extent,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl ViewWindow {
    /// Create a view window, capping both pixel dimensions.
    ///
    /// Warm reads against very large canvases are pointless; the cap bounds
    /// the per-band block read the job issues.
    pub fn capped(extent: Extent, width: u32, height: u32, max_dimension: u32) -> Self {
        Self {
            extent,
            width: width.min(max_dimension),
            height: height.min(max_dimension),
        }
    }
}

/// Pixel data type of a raster band, as reported by the provider.
///
/// Used when constructing the contrast enhancement for the grayscale
/// renderer; the core does not interpret it further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterDataType {
    /// Unsigned 8-bit
    Byte,
    /// Unsigned 16-bit
    UInt16,
    /// Signed 16-bit
    Int16,
    /// Unsigned 32-bit
    UInt32,
    /// Signed 32-bit
    Int32,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

/// Sampled statistics for one band, as returned by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    /// Sample mean
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Observed minimum value
    pub minimum: f64,
    /// Observed maximum value
    pub maximum: f64,
}

/// Opaque identifier of a layer in the host's layer registry.
///
/// Used to address legend/symbology refresh requests back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(pub String);

impl LayerId {
    /// Create a layer id from a host-assigned string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Raster data provider capability.
///
/// Implementations are called from the cache-warming worker thread, so the
/// provider must tolerate concurrent read access while the interactive
/// thread issues repaint requests (`Send + Sync`).
pub trait RasterProvider: Send + Sync {
    /// Read a block covering `window` for `band`.
    ///
    /// This call exists for its side effect: it populates the provider's
    /// internal read cache so later interactive renders of the same window
    /// are fast. The block content itself is not returned to the core.
    fn read_block(&self, band: u32, window: &ViewWindow) -> Result<(), ProviderError>;

    /// Sampled statistics for `band` over `extent`, with at most
    /// `sample_size` pixels sampled.
    fn band_statistics(
        &self,
        band: u32,
        extent: &Extent,
        sample_size: u32,
    ) -> Result<BandStatistics, ProviderError>;

    /// Pixel data type of `band`.
    fn data_type(&self, band: u32) -> RasterDataType;
}

/// Raster layer capability: band metadata, renderer control, repaint.
///
/// The core holds a non-owning `Arc<dyn RasterLayer>`; the host's layer
/// registry owns the layer's lifetime and may close it between operations,
/// which the layer reports through `is_valid`.
pub trait RasterLayer {
    /// Host-assigned layer identifier.
    fn id(&self) -> LayerId;

    /// Number of bands, contiguous in `[1, band_count]`.
    fn band_count(&self) -> u32;

    /// The layer's data provider.
    fn provider(&self) -> Arc<dyn RasterProvider>;

    /// Whether the layer is still open and usable.
    fn is_valid(&self) -> bool;

    /// Install a single-band grayscale renderer with a stretch-to-min-max
    /// contrast enhancement bound to `band`.
    fn install_gray_renderer(
        &self,
        band: u32,
        data_type: RasterDataType,
    ) -> Result<(), crate::error::ScrubError>;

    /// Switch the installed renderer's active gray band.
    fn set_gray_band(&self, band: u32);

    /// Update the contrast enhancement's minimum/maximum window.
    fn set_contrast_range(&self, low: f64, high: f64);

    /// Schedule a repaint of the layer.
    fn trigger_repaint(&self);
}

/// Host map-view capability: current view, layer selection, legend refresh.
pub trait MapHost {
    /// The currently selected layer, if it is a raster layer.
    fn active_raster_layer(&self) -> Option<Arc<dyn RasterLayer>>;

    /// Current visible extent of the map view.
    fn view_extent(&self) -> Extent;

    /// Output size of the map view in pixels, as (width, height).
    fn view_size(&self) -> (u32, u32);

    /// Ask the host to refresh the legend/symbology entry for a layer.
    fn refresh_layer_legend(&self, layer: &LayerId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_WARM_DIMENSION;

    #[test]
    fn test_view_window_caps_dimensions() {
        let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
        let window = ViewWindow::capped(extent, 4096, 800, MAX_WARM_DIMENSION);
        assert_eq!(window.width, 1000);
        assert_eq!(window.height, 800);
    }

    #[test]
    fn test_view_window_keeps_small_dimensions() {
        let extent = Extent::new(-5.0, -5.0, 5.0, 5.0);
        let window = ViewWindow::capped(extent, 640, 480, MAX_WARM_DIMENSION);
        assert_eq!(window.width, 640);
        assert_eq!(window.height, 480);
        assert_eq!(window.extent, extent);
    }
}
