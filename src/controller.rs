//! Scrubber controller: the panel-side state machine.
//!
//! Owns at most one in-flight cache-warming job, the live stats table, and
//! the current slider position. The host GUI wires its widgets to the
//! operations here: the prepare button calls `start_preparation`, the event
//! loop polls `pump_events`, the slider calls `apply_band`, the play button
//! calls `toggle_play`, and the host timer drives `play_tick`. The
//! controller never blocks the interactive thread; all provider work
//! happens inside the job's worker.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ScrubConfig;
use crate::error::ScrubError;
use crate::job::{JobEvent, JobHandle, WarmParams};
use crate::raster::{MapHost, RasterLayer, ViewWindow};
use crate::stats::{StatsTable, next_band};

/// Lifecycle state of the scrubber panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubState {
    /// No layer prepared; slider and play disabled
    Idle,
    /// Cache-warming job running
    Preparing,
    /// Stats table installed; slider active
    Ready,
}

/// Status line shown to the user by the host's label widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Nothing prepared yet
    Idle,
    /// No raster layer selected in the host
    NoSelection,
    /// Cache warming in progress
    Caching,
    /// Table installed, scrubbing available
    Ready,
    /// An operation failed; message for the user
    Error(String),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Idle => write!(f, "Select raster & prepare"),
            Status::NoSelection => write!(f, "Error: no raster selected"),
            Status::Caching => write!(f, "Caching..."),
            Status::Ready => write!(f, "Ready."),
            Status::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Progress of the in-flight preparation run, for the host's progress bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Last band processed (0 before the first progress event)
    pub band: u32,
    /// Total bands in the run
    pub total: u32,
    /// Completion percentage
    pub percent: f64,
}

/// The band-scrubber state machine.
pub struct ScrubController {
    /// Host map-view capability
    host: Arc<dyn MapHost>,
    /// Tuning configuration
    config: ScrubConfig,
    /// Current lifecycle state
    state: ScrubState,
    /// Non-owning reference to the layer being scrubbed
    layer: Option<Arc<dyn RasterLayer>>,
    /// Live stats table; replaced wholesale on job completion
    table: StatsTable,
    /// Handle to the in-flight job, if any
    job: Option<JobHandle>,
    /// Slider position (1-based band index)
    current_band: u32,
    /// Upper slider bound once Ready
    band_count: u32,
    /// Whether play mode is active
    playing: bool,
    /// Time of the last play-mode advance
    last_advance: Option<Instant>,
    /// User-visible status line
    status: Status,
    /// Progress of the in-flight run, if Preparing
    progress: Option<Progress>,
}

impl ScrubController {
    /// Create a controller with default tuning.
    pub fn new(host: Arc<dyn MapHost>) -> Self {
        Self::with_config(host, ScrubConfig::default())
    }

    /// Create a controller with explicit tuning.
    pub fn with_config(host: Arc<dyn MapHost>, config: ScrubConfig) -> Self {
        Self {
            host,
            config,
            state: ScrubState::Idle,
            layer: None,
            table: StatsTable::new(),
            job: None,
            current_band: 0,
            band_count: 0,
            playing: false,
            last_advance: None,
            status: Status::Idle,
            progress: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScrubState {
        self.state
    }

    /// Current status line.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Progress of the in-flight run, if any.
    pub fn progress(&self) -> Option<Progress> {
        self.progress
    }

    /// Current slider position (1-based), 0 before the first run.
    pub fn current_band(&self) -> u32 {
        self.current_band
    }

    /// Slider range `[1, band_count]` once a run has completed.
    pub fn slider_range(&self) -> Option<(u32, u32)> {
        if self.state == ScrubState::Ready {
            Some((1, self.band_count))
        } else {
            None
        }
    }

    /// Whether a preparation run is in flight.
    pub fn is_preparing(&self) -> bool {
        self.state == ScrubState::Preparing
    }

    /// Whether play mode is active.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The configured play interval, for the host's timer.
    pub fn play_interval(&self) -> std::time::Duration {
        self.config.play_interval()
    }

    /// Start (or restart) a preparation run against the host's active
    /// raster layer.
    ///
    /// Safe-cancels any in-flight job first, so at most one job is ever
    /// active. Installs a baseline grayscale renderer on band 1 and
    /// repaints immediately, then snapshots the view window and spawns the
    /// cache-warming job. Errors are also reflected in the status line.
    pub fn start_preparation(&mut self) -> Result<(), ScrubError> {
        let Some(layer) = self.host.active_raster_layer() else {
            log::info!("Preparation requested without a raster selection");
            self.status = Status::NoSelection;
            return Err(ScrubError::NoRasterSelected);
        };

        // Safe-cancel: dropping the old handle also discards its events.
        if let Some(old_job) = self.job.take() {
            log::debug!("Cancelling in-flight preparation before restart");
            old_job.cancel();
        }

        if let Err(e) = self.begin_run(&layer) {
            self.status = Status::Error(e.to_string());
            return Err(e);
        }

        self.layer = Some(layer);
        self.state = ScrubState::Preparing;
        self.status = Status::Caching;
        Ok(())
    }

    /// Renderer setup and job spawn for one run. Split out so a failure at
    /// any step maps to a single status update in `start_preparation`.
    fn begin_run(&mut self, layer: &Arc<dyn RasterLayer>) -> Result<(), ScrubError> {
        if !layer.is_valid() {
            return Err(ScrubError::LayerClosed);
        }

        let provider = layer.provider();
        let band_count = layer.band_count();

        // Baseline render while warming proceeds.
        layer.install_gray_renderer(1, provider.data_type(1))?;
        layer.trigger_repaint();
        self.host.refresh_layer_legend(&layer.id());

        let (width, height) = self.host.view_size();
        let window = ViewWindow::capped(
            self.host.view_extent(),
            width,
            height,
            self.config.max_warm_dimension,
        );
        let params = WarmParams {
            stretch_multiplier: self.config.stretch_stddev_multiplier,
            sample_size: self.config.stats_sample_size,
        };

        log::info!(
            "Starting cache warm: {} bands over {}x{} window",
            band_count,
            window.width,
            window.height
        );
        let job =
            JobHandle::spawn(provider, band_count, window, params).map_err(ScrubError::Job)?;

        self.job = Some(job);
        self.progress = Some(Progress {
            band: 0,
            total: band_count,
            percent: 0.0,
        });
        Ok(())
    }

    /// Request cancellation of the in-flight preparation run, if any.
    ///
    /// Non-blocking: the worker observes the flag at its next between-band
    /// poll and answers with a `Canceled` event, which `pump_events` turns
    /// into the Idle transition. A no-op outside Preparing.
    pub fn cancel_preparation(&mut self) {
        if let Some(job) = &self.job {
            log::debug!("Cancellation requested for in-flight preparation");
            job.cancel();
        }
    }

    /// Drain pending job events, in the order the job produced them.
    ///
    /// Call from the host's event loop. Progress events update the progress
    /// fields only; a terminal event clears the job reference exactly once
    /// and transitions the state machine.
    pub fn pump_events(&mut self) {
        loop {
            let Some(job) = &self.job else { return };
            let Some(event) = job.try_next_event() else {
                return;
            };
            match event {
                JobEvent::Progress {
                    band,
                    total,
                    percent,
                } => {
                    self.progress = Some(Progress {
                        band,
                        total,
                        percent,
                    });
                }
                JobEvent::Finished(table) => {
                    self.job = None;
                    self.on_finished(table);
                }
                JobEvent::Canceled => {
                    log::info!("Preparation canceled");
                    self.job = None;
                    self.progress = None;
                    self.state = ScrubState::Idle;
                    self.status = Status::Error("cache warming canceled".to_string());
                }
                JobEvent::Failed(message) => {
                    log::warn!("Preparation failed: {}", message);
                    self.job = None;
                    self.progress = None;
                    self.state = ScrubState::Idle;
                    self.status = Status::Error(message);
                }
            }
        }
    }

    /// Install the delivered table, enable the slider, and show band 1.
    fn on_finished(&mut self, table: StatsTable) {
        self.band_count = table.len() as u32;
        self.table = table;
        self.progress = None;
        self.state = ScrubState::Ready;
        self.status = Status::Ready;
        log::info!("Preparation finished: {} bands ready", self.band_count);
        self.apply_band(1);
    }

    /// Render `band` through its cached contrast-stretch bounds.
    ///
    /// Looks up the band in the live table (falling back to the default
    /// display range for a miss), updates the renderer's gray band and
    /// contrast window, and asks the host to repaint and refresh the
    /// legend. No-op when no layer is current or it has become invalid.
    pub fn apply_band(&mut self, band: u32) {
        let Some(layer) = &self.layer else { return };
        if !layer.is_valid() {
            log::debug!("Layer closed, skipping band {}", band);
            return;
        }

        self.current_band = band;
        let stats = self.table.get_or_fallback(band);
        layer.set_gray_band(band);
        layer.set_contrast_range(stats.low, stats.high);
        layer.trigger_repaint();
        self.host.refresh_layer_legend(&layer.id());
    }

    /// Toggle play mode. Only meaningful in Ready state; returns the new
    /// play flag.
    ///
    /// Entering play mode seeds the advance clock, so the first advance
    /// happens one full interval after the toggle, not immediately.
    pub fn toggle_play(&mut self) -> bool {
        if self.state != ScrubState::Ready {
            self.playing = false;
            return false;
        }
        self.playing = !self.playing;
        if self.playing {
            self.last_advance = Some(Instant::now());
        }
        self.playing
    }

    /// Advance the slider one band (with wraparound) if play mode is
    /// active and the configured interval has elapsed since the last
    /// advance. The host timer supplies `now`.
    pub fn play_tick(&mut self, now: Instant) {
        if !self.playing || self.state != ScrubState::Ready || self.band_count == 0 {
            return;
        }
        let due = match self.last_advance {
            None => true,
            Some(last) => now.duration_since(last) >= self.config.play_interval(),
        };
        if due {
            self.last_advance = Some(now);
            let band = next_band(self.current_band, self.band_count);
            self.apply_band(band);
        }
    }

    /// Tear the panel down: cancel any in-flight job (a no-op on an
    /// already-finished handle), stop play mode, and reset to Idle.
    pub fn close(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel();
        }
        self.playing = false;
        self.last_advance = None;
        self.layer = None;
        self.table = StatsTable::new();
        self.progress = None;
        self.current_band = 0;
        self.band_count = 0;
        self.state = ScrubState::Idle;
        self.status = Status::Idle;
        log::debug!("Scrubber closed");
    }
}
