//! Error types for the band scrubber core.

use thiserror::Error;

/// Error returned by a raster data provider during a block read or a
/// statistics request.
///
/// Providers wrap whatever host-side failure occurred (driver error, layer
/// torn down mid-read, ...) into this type; the band index records which
/// band the failing call targeted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("provider fault on band {band}: {message}")]
pub struct ProviderError {
    /// Band the failing provider call targeted (1-based)
    pub band: u32,
    /// Description of the failure
    pub message: String,
}

impl ProviderError {
    /// Create a provider error for a band.
    pub fn new(band: u32, message: impl Into<String>) -> Self {
        Self {
            band,
            message: message.into(),
        }
    }
}

/// Errors that can occur in scrubber controller operations.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// No raster layer is selected in the host application
    #[error("no raster layer selected")]
    NoRasterSelected,

    /// The selected layer was closed or removed by the host
    #[error("selected layer is no longer valid")]
    LayerClosed,

    /// A provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Renderer construction or update failed
    #[error("renderer error: {0}")]
    Renderer(String),

    /// The background job could not be started
    #[error("job error: {0}")]
    Job(String),
}

impl ScrubError {
    /// Create a renderer error with a message.
    pub fn renderer(message: impl Into<String>) -> Self {
        Self::Renderer(message.into())
    }
}
